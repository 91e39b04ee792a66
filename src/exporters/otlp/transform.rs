use opentelemetry_proto::tonic::{
    collector::logs::v1::ExportLogsServiceRequest,
    collector::trace::v1::ExportTraceServiceRequest,
    common::v1::{any_value::Value, AnyValue, InstrumentationScope},
    logs::v1::{LogRecord as OtlpLogRecord, ResourceLogs, ScopeLogs},
    resource::v1::Resource,
    trace::v1::{span::Event, ResourceSpans, ScopeSpans, Span as OtlpSpan, Status},
};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::ResourceInfo;
use crate::model::attributes::to_key_values;
use crate::model::{AttributeValue, LogRecord, SpanRecord};

const SERVICE_NAME_KEY: &str = "service.name";
const SERVICE_VERSION_KEY: &str = "service.version";
const SESSION_ID_KEY: &str = "session.id";
const SDK_NAME_KEY: &str = "telemetry.sdk.name";
const SDK_NAME: &str = env!("CARGO_PKG_NAME");

fn unix_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}

fn scope() -> InstrumentationScope {
    InstrumentationScope {
        name: SDK_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ..Default::default()
    }
}

pub fn build_resource(info: &ResourceInfo, session_id: &str) -> Resource {
    let mut attrs = info.attributes.clone();
    attrs.insert(
        SERVICE_NAME_KEY.to_string(),
        AttributeValue::String(info.service_name.clone()),
    );
    if let Some(ref version) = info.service_version {
        attrs.insert(
            SERVICE_VERSION_KEY.to_string(),
            AttributeValue::String(version.clone()),
        );
    }
    attrs.insert(
        SESSION_ID_KEY.to_string(),
        AttributeValue::String(session_id.to_string()),
    );
    attrs.insert(SDK_NAME_KEY.to_string(), AttributeValue::from(SDK_NAME));

    Resource {
        attributes: to_key_values(&attrs),
        ..Default::default()
    }
}

pub fn transform_logs(resource: Resource, records: &[&LogRecord]) -> ExportLogsServiceRequest {
    let observed = unix_nanos(SystemTime::now());
    let log_records = records
        .iter()
        .map(|record| transform_log(record, observed))
        .collect();

    ExportLogsServiceRequest {
        resource_logs: vec![ResourceLogs {
            resource: Some(resource),
            scope_logs: vec![ScopeLogs {
                scope: Some(scope()),
                log_records,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

fn transform_log(record: &LogRecord, observed_time_unix_nano: u64) -> OtlpLogRecord {
    OtlpLogRecord {
        time_unix_nano: unix_nanos(record.timestamp),
        observed_time_unix_nano,
        severity_number: record.severity.number(),
        severity_text: record.severity.as_str().to_string(),
        body: Some(AnyValue {
            value: Some(Value::StringValue(record.body.clone())),
        }),
        attributes: to_key_values(&record.attributes),
        trace_id: record.trace_id.map(|id| id.to_vec()).unwrap_or_default(),
        span_id: record.span_id.map(|id| id.to_vec()).unwrap_or_default(),
        ..Default::default()
    }
}

pub fn transform_spans(resource: Resource, spans: &[&SpanRecord]) -> ExportTraceServiceRequest {
    ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            resource: Some(resource),
            scope_spans: vec![ScopeSpans {
                scope: Some(scope()),
                spans: spans.iter().map(|span| transform_span(span)).collect(),
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

fn transform_span(span: &SpanRecord) -> OtlpSpan {
    let events = span
        .events
        .iter()
        .map(|event| Event {
            time_unix_nano: unix_nanos(event.timestamp),
            name: event.name.clone(),
            attributes: to_key_values(&event.attributes),
            ..Default::default()
        })
        .collect();

    OtlpSpan {
        trace_id: span.trace_id.to_vec(),
        span_id: span.span_id.to_vec(),
        parent_span_id: span.parent_span_id.map(|id| id.to_vec()).unwrap_or_default(),
        name: span.name.clone(),
        kind: span.kind.as_i32(),
        start_time_unix_nano: unix_nanos(span.start),
        end_time_unix_nano: unix_nanos(span.end),
        attributes: to_key_values(&span.attributes),
        events,
        status: Some(Status {
            message: span.status.message().to_string(),
            code: span.status.code(),
        }),
        ..Default::default()
    }
}
