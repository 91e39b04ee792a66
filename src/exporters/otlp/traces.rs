use async_trait::async_trait;
use prost::Message;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::transform::{build_resource, transform_spans};
use super::ResourceInfo;
use crate::exporters::http::{HttpTransport, CONTENT_TYPE_PROTOBUF};
use crate::exporters::{ExportError, Exporter};
use crate::model::SpanRecord;
use crate::pipeline::{EventQueueItem, SpanItem};
use crate::session::SessionProvider;

/// Ships `SpanItem` payloads as an OTLP `ExportTraceServiceRequest`.
pub struct OtlpTraceExporter {
    transport: Arc<HttpTransport>,
    url: String,
    resource: ResourceInfo,
    session: Arc<dyn SessionProvider>,
    timeout: Option<Duration>,
}

impl OtlpTraceExporter {
    pub fn new(
        transport: Arc<HttpTransport>,
        url: String,
        resource: ResourceInfo,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            transport,
            url,
            resource,
            session,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Exporter for OtlpTraceExporter {
    async fn export(&self, items: &[EventQueueItem]) -> Result<(), ExportError> {
        let spans: Vec<&SpanRecord> = items
            .iter()
            .filter_map(|item| item.downcast::<SpanItem>())
            .map(|span| &span.record)
            .collect();

        if spans.is_empty() {
            return Ok(());
        }

        let resource = build_resource(&self.resource, &self.session.session_id());
        let body = transform_spans(resource, &spans).encode_to_vec();

        let start = Instant::now();
        self.transport
            .post(&self.url, CONTENT_TYPE_PROTOBUF, body, self.timeout)
            .await?;

        debug!(
            spans = spans.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Exported spans"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "otlp-traces"
    }
}
