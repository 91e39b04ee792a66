use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use otel_edge_pipeline::model::TouchKind;
use otel_edge_pipeline::{
    BatchWorkerConfig, Config, EventQueue, EventQueueItem, ExportError, Exporter, FixedSession, LogItem, LogRecord,
    MultiExporter, RuleSampler, Severity, SpanItem, SpanRecord, TouchItemPayload, TransportService,
};
use prost::Message;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn config_for(server: &MockServer, extra: &str) -> Config {
    let yaml = format!(
        r#"
service:
  name: e2e-app
  session_id: "e2e-session"
batch:
  idle_interval_ms: 60000
exporters:
  otlp:
    endpoint: "{uri}"
    compression: false
  replay:
    endpoint: "{uri}/replay"
    compression: false
{extra}
"#,
        uri = server.uri(),
        extra = extra
    );
    Config::from_str(&yaml).unwrap()
}

async fn requests_to(server: &MockServer, route: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == route)
        .collect()
}

async fn wait_for(server: &MockServer, route: &str, count: usize) -> Vec<Request> {
    for _ in 0..100 {
        let requests = requests_to(server, route).await;
        if requests.len() >= count {
            return requests;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    requests_to(server, route).await
}

async fn mount_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

/// Parks every export until the test releases a permit.
struct GatedExporter {
    gate: Arc<Semaphore>,
    entered: Arc<Semaphore>,
    items: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

#[async_trait]
impl Exporter for GatedExporter {
    async fn export(&self, items: &[EventQueueItem]) -> Result<(), ExportError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.entered.add_permits(1);
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        self.items.fetch_add(items.len(), Ordering::SeqCst);
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

fn log_count(requests: &[Request]) -> usize {
    requests
        .iter()
        .map(|r| {
            ExportLogsServiceRequest::decode(&r.body[..])
                .unwrap()
                .resource_logs
                .iter()
                .flat_map(|rl| rl.scope_logs.iter())
                .map(|sl| sl.log_records.len())
                .sum::<usize>()
        })
        .sum()
}

#[tokio::test]
async fn test_flush_delivers_everything_in_batches() {
    let server = MockServer::start().await;
    mount_ok(&server).await;

    let transport = TransportService::from_config(&config_for(&server, "")).unwrap();
    transport.start();

    for i in 0..45 {
        transport.enqueue(EventQueueItem::new(LogItem::new(LogRecord::new(
            Severity::Info,
            format!("event {}", i),
        ))));
    }
    transport.enqueue(EventQueueItem::new(SpanItem::new(SpanRecord::new("checkout", [1; 16], [2; 8]))));
    transport.enqueue(EventQueueItem::new(TouchItemPayload::new(TouchKind::Tap, 5.0, 6.0)));
    transport.flush();

    // 47 items at cost 300 split 20 / 20 / 7
    let log_requests = wait_for(&server, "/v1/logs", 3).await;
    assert_eq!(log_count(&log_requests), 45);

    let trace_requests = wait_for(&server, "/v1/traces", 1).await;
    let traces = ExportTraceServiceRequest::decode(&trace_requests[0].body[..]).unwrap();
    assert_eq!(traces.resource_spans[0].scope_spans[0].spans[0].name, "checkout");

    let replay_requests = wait_for(&server, "/replay", 1).await;
    assert_eq!(replay_requests.len(), 1);

    assert!(transport.queue().is_empty());
    transport.shutdown().await;
}

#[tokio::test]
async fn test_static_sampling_rules_apply() {
    let server = MockServer::start().await;
    mount_ok(&server).await;

    let sampling = r#"
sampling:
  logs:
    - message:
        regex_value: "^debug:"
      sampling_ratio: 0
"#;
    let transport = TransportService::from_config(&config_for(&server, sampling)).unwrap();
    transport.start();

    transport.enqueue(EventQueueItem::new(LogItem::new(LogRecord::new(Severity::Info, "debug: cache miss"))));
    transport.enqueue(EventQueueItem::new(LogItem::new(LogRecord::new(Severity::Info, "user login"))));
    transport.flush();

    let requests = wait_for(&server, "/v1/logs", 1).await;
    assert_eq!(log_count(&requests), 1);

    let request = ExportLogsServiceRequest::decode(&requests[0].body[..]).unwrap();
    let record = &request.resource_logs[0].scope_logs[0].log_records[0];
    assert!(record.attributes.is_empty());
    transport.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_exports_remaining_items() {
    let server = MockServer::start().await;
    mount_ok(&server).await;

    let transport = TransportService::from_config(&config_for(&server, "")).unwrap();
    transport.start();

    for i in 0..5 {
        transport.enqueue(EventQueueItem::new(LogItem::new(LogRecord::new(
            Severity::Warn,
            format!("late {}", i),
        ))));
    }

    let exported = transport.shutdown().await;
    assert_eq!(exported, 5);
    assert_eq!(log_count(&requests_to(&server, "/v1/logs").await), 5);
}

#[tokio::test]
async fn test_failed_export_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/logs"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_ok(&server).await;

    let transport = TransportService::from_config(&config_for(&server, "")).unwrap();
    transport.start();

    transport.enqueue(EventQueueItem::new(LogItem::new(LogRecord::new(Severity::Error, "lost"))));
    transport.flush();

    let requests = wait_for(&server, "/v1/logs", 1).await;
    assert_eq!(requests.len(), 1);
    assert!(transport.queue().is_empty());

    // The failed batch is gone; a further flush sends nothing new
    transport.flush();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(requests_to(&server, "/v1/logs").await.len(), 1);
    transport.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_after_stop_keeps_one_export_in_flight() {
    let transport = Arc::new(TransportService::new(
        Arc::new(EventQueue::new()),
        Arc::new(MultiExporter::new()),
        Arc::new(FixedSession::new("gated")),
        Arc::new(RuleSampler::new()),
        BatchWorkerConfig {
            idle_interval: Duration::from_secs(60),
            ..Default::default()
        },
    ));
    let gate = Arc::new(Semaphore::new(0));
    let entered = Arc::new(Semaphore::new(0));
    let exporter = Arc::new(GatedExporter {
        gate: gate.clone(),
        entered: entered.clone(),
        items: AtomicUsize::new(0),
        active: AtomicUsize::new(0),
        max_active: AtomicUsize::new(0),
    });
    transport.add_exporter(exporter.clone());

    for i in 0..40 {
        transport.enqueue(EventQueueItem::new(LogItem::new(LogRecord::new(
            Severity::Info,
            format!("queued {}", i),
        ))));
    }

    transport.start();
    transport.flush();
    entered.acquire().await.unwrap().forget();

    transport.stop();
    let shutdown = tokio::spawn({
        let transport = transport.clone();
        async move { transport.shutdown().await }
    });

    // The final drain must not start while the first batch is still parked
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(exporter.active.load(Ordering::SeqCst), 1);

    gate.add_permits(10);
    let drained = shutdown.await.unwrap();

    assert_eq!(drained, 20);
    assert_eq!(exporter.items.load(Ordering::SeqCst), 40);
    assert_eq!(exporter.max_active.load(Ordering::SeqCst), 1);
    assert!(transport.queue().is_empty());
}
