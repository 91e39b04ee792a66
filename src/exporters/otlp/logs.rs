use async_trait::async_trait;
use prost::Message;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::transform::{build_resource, transform_logs};
use super::ResourceInfo;
use crate::exporters::http::{HttpTransport, CONTENT_TYPE_PROTOBUF};
use crate::exporters::{ExportError, Exporter};
use crate::model::LogRecord;
use crate::pipeline::{EventQueueItem, LogItem};
use crate::session::SessionProvider;

/// Ships `LogItem` payloads as an OTLP `ExportLogsServiceRequest`.
pub struct OtlpLogExporter {
    transport: Arc<HttpTransport>,
    url: String,
    resource: ResourceInfo,
    session: Arc<dyn SessionProvider>,
    timeout: Option<Duration>,
}

impl OtlpLogExporter {
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

    /// Per-request timeout; the transport default still applies if shorter
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Exporter for OtlpLogExporter {
    async fn export(&self, items: &[EventQueueItem]) -> Result<(), ExportError> {
        let records: Vec<&LogRecord> = items
            .iter()
            .filter_map(|item| item.downcast::<LogItem>())
            .map(|log| &log.record)
            .collect();

        if records.is_empty() {
            return Ok(());
        }

        let resource = build_resource(&self.resource, &self.session.session_id());
        let request = transform_logs(resource, &records);
        let body = request.encode_to_vec();

        let start = Instant::now();
        self.transport
            .post(&self.url, CONTENT_TYPE_PROTOBUF, body, self.timeout)
            .await?;

        debug!(
            logs = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Exported logs"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "otlp-logs"
    }
}
