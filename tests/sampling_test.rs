use async_trait::async_trait;
use otel_edge_pipeline::model::{AttributeValue, Attributes, LogRecord, Severity, SpanRecord, TouchItemPayload, TouchKind};
use otel_edge_pipeline::sampling::{
    sample_log, sample_logs, sample_spans, ExportSampler, LogSamplingRule, MatchConfig, RuleSampler,
    SamplingConfig, SamplingResult, SpanSamplingRule, SAMPLING_RATIO_ATTRIBUTE,
};
use otel_edge_pipeline::exporters::SampledKind;
use otel_edge_pipeline::{EventQueueItem, ExportError, Exporter, LogItem, SamplingExporter, SpanItem};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Sampler returning a fixed decision for every record.
struct FixedSampler {
    enabled: AtomicBool,
    result: Mutex<SamplingResult>,
    calls: AtomicUsize,
}

impl FixedSampler {
    fn new(enabled: bool, result: SamplingResult) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            result: Mutex::new(result),
            calls: AtomicUsize::new(0),
        }
    }

    fn decide(&self) -> SamplingResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().unwrap().clone()
    }
}

impl ExportSampler for FixedSampler {
    fn sample_span(&self, _span: &SpanRecord) -> SamplingResult {
        self.decide()
    }

    fn sample_log(&self, _record: &LogRecord) -> SamplingResult {
        self.decide()
    }

    fn is_sampling_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_config(&self, config: Option<SamplingConfig>) {
        self.enabled.store(config.is_some(), Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Recording {
    batches: Mutex<Vec<Vec<EventQueueItem>>>,
}

#[async_trait]
impl Exporter for Recording {
    async fn export(&self, items: &[EventQueueItem]) -> Result<(), ExportError> {
        self.batches.lock().unwrap().push(items.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

fn attrs(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), AttributeValue::from(*v)))
        .collect()
}

fn log_with(body: &str, attributes: Attributes) -> LogRecord {
    LogRecord::new(Severity::Info, body).with_attributes(attributes)
}

#[test]
fn test_existing_attributes_win_over_sampler() {
    let sampler = FixedSampler::new(true, SamplingResult::keep_with(attrs(&[("k", "new"), ("j", "extra")])));
    let record = log_with("hello", attrs(&[("k", "orig")]));

    let sampled = sample_log(&sampler, record).unwrap();

    assert_eq!(sampled.attributes, attrs(&[("k", "orig"), ("j", "extra")]));
}

#[test]
fn test_disabled_sampler_passes_records_untouched() {
    let sampler = FixedSampler::new(false, SamplingResult::discard());
    let records = vec![log_with("a", Attributes::new()), log_with("b", Attributes::new())];

    let sampled = sample_logs(&sampler, records.clone());

    assert_eq!(sampled, records);
    assert_eq!(sampler.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_dropped_records_are_removed_in_order() {
    let sampler = RuleSampler::new();
    sampler.set_config(Some(SamplingConfig {
        spans: vec![SpanSamplingRule {
            name: Some(MatchConfig::regex("^health")),
            attributes: vec![],
            events: vec![],
            sampling_ratio: 0,
        }],
        logs: vec![],
    }));

    let spans = vec![
        SpanRecord::new("checkout", [1; 16], [1; 8]),
        SpanRecord::new("healthcheck", [1; 16], [2; 8]),
        SpanRecord::new("login", [1; 16], [3; 8]),
    ];

    let names: Vec<String> = sample_spans(&sampler, spans).into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["checkout", "login"]);
}

#[test]
fn test_rule_sampler_annotates_kept_records() {
    let sampler = RuleSampler::with_seed(7);
    sampler.set_config(Some(SamplingConfig {
        spans: vec![],
        logs: vec![LogSamplingRule {
            message: Some(MatchConfig::exact("tick")),
            severity_text: None,
            attributes: vec![],
            sampling_ratio: 1,
        }],
    }));

    let kept = sample_log(&sampler, log_with("tick", Attributes::new())).unwrap();
    assert_eq!(kept.attributes.get(SAMPLING_RATIO_ATTRIBUTE), Some(&AttributeValue::Int(1)));

    let untouched = sample_log(&sampler, log_with("other", Attributes::new())).unwrap();
    assert!(untouched.attributes.is_empty());
}

#[tokio::test]
async fn test_decorator_skips_inner_when_everything_dropped() {
    let inner = Arc::new(Recording::default());
    let sampler = Arc::new(FixedSampler::new(true, SamplingResult::discard()));
    let exporter = SamplingExporter::new(inner.clone(), sampler);

    let batch = vec![
        EventQueueItem::new(LogItem::new(log_with("a", Attributes::new()))),
        EventQueueItem::new(SpanItem::new(SpanRecord::new("s", [1; 16], [1; 8]))),
    ];

    exporter.export(&batch).await.unwrap();
    assert!(inner.batches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_decorator_passes_other_payloads_through() {
    let inner = Arc::new(Recording::default());
    let sampler = Arc::new(FixedSampler::new(true, SamplingResult::discard()));
    let exporter = SamplingExporter::new(inner.clone(), sampler);

    let batch = vec![
        EventQueueItem::new(LogItem::new(log_with("dropped", Attributes::new()))),
        EventQueueItem::new(TouchItemPayload::new(TouchKind::Tap, 1.0, 2.0)),
    ];

    exporter.export(&batch).await.unwrap();

    let batches = inner.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert!(batches[0][0].downcast::<TouchItemPayload>().is_some());
}

#[tokio::test]
async fn test_decorator_merges_attributes_and_keeps_timestamp() {
    let inner = Arc::new(Recording::default());
    let sampler = Arc::new(FixedSampler::new(true, SamplingResult::keep_with(attrs(&[("k", "new"), ("j", "extra")]))));
    let exporter = SamplingExporter::new(inner.clone(), sampler);

    let item = EventQueueItem::new(LogItem::new(log_with("hello", attrs(&[("k", "orig")]))));
    let timestamp = item.timestamp();
    exporter.export(&[item]).await.unwrap();

    let batches = inner.batches.lock().unwrap();
    let exported = &batches[0][0];
    let log = exported.downcast::<LogItem>().unwrap();
    assert_eq!(log.record.attributes, attrs(&[("k", "orig"), ("j", "extra")]));
    assert_eq!(exported.timestamp(), timestamp);
}

#[tokio::test]
async fn test_decorator_hot_swap_config() {
    let inner = Arc::new(Recording::default());
    let sampler = Arc::new(RuleSampler::new());
    let exporter = SamplingExporter::new(inner.clone(), sampler.clone());
    let batch = vec![EventQueueItem::new(LogItem::new(log_with("noisy", Attributes::new())))];

    exporter.export(&batch).await.unwrap();
    assert_eq!(inner.batches.lock().unwrap().len(), 1);

    sampler.set_config(Some(SamplingConfig {
        spans: vec![],
        logs: vec![LogSamplingRule {
            message: Some(MatchConfig::exact("noisy")),
            severity_text: None,
            attributes: vec![],
            sampling_ratio: 0,
        }],
    }));
    exporter.export(&batch).await.unwrap();
    assert_eq!(inner.batches.lock().unwrap().len(), 1);

    sampler.set_config(None);
    exporter.export(&batch).await.unwrap();
    assert_eq!(inner.batches.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_log_decorator_leaves_spans_unsampled() {
    let inner = Arc::new(Recording::default());
    let sampler = Arc::new(FixedSampler::new(true, SamplingResult::discard()));
    let exporter = SamplingExporter::new(inner.clone(), sampler.clone()).with_kind(SampledKind::Logs);

    let batch = vec![
        EventQueueItem::new(LogItem::new(log_with("dropped", Attributes::new()))),
        EventQueueItem::new(SpanItem::new(SpanRecord::new("s1", [1; 16], [1; 8]))),
        EventQueueItem::new(SpanItem::new(SpanRecord::new("s2", [1; 16], [2; 8]))),
    ];
    exporter.export(&batch).await.unwrap();

    // Only the log reached the sampler
    assert_eq!(sampler.calls.load(Ordering::SeqCst), 1);
    let batches = inner.batches.lock().unwrap();
    assert_eq!(batches[0].len(), 2);
    assert!(batches[0].iter().all(|item| item.downcast::<SpanItem>().is_some()));
}

#[tokio::test]
async fn test_span_decorator_leaves_logs_unsampled() {
    let inner = Arc::new(Recording::default());
    let sampler = Arc::new(FixedSampler::new(true, SamplingResult::discard()));
    let exporter = SamplingExporter::new(inner.clone(), sampler.clone()).with_kind(SampledKind::Spans);

    let batch = vec![
        EventQueueItem::new(LogItem::new(log_with("kept", Attributes::new()))),
        EventQueueItem::new(SpanItem::new(SpanRecord::new("dropped", [1; 16], [1; 8]))),
    ];
    exporter.export(&batch).await.unwrap();

    assert_eq!(sampler.calls.load(Ordering::SeqCst), 1);
    let batches = inner.batches.lock().unwrap();
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].downcast::<LogItem>().unwrap().record.body, "kept");
}
