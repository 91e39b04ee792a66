pub mod http;
mod initializer;
pub mod multi;
pub mod otlp;
pub mod replay;
pub mod sampling;

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::EventQueueItem;

pub use http::{HttpClientConfig, HttpTransport};
pub use initializer::Exporters;
pub use multi::MultiExporter;
pub use otlp::{OtlpConfig, OtlpLogExporter, OtlpTraceExporter, ResourceInfo};
pub use replay::{ReplayConfig, ReplayExporter};
pub use sampling::{SampledKind, SamplingExporter};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Collector returned error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Failed to encode payload: {0}")]
    Encode(String),

    #[error("Failed to compress payload: {0}")]
    Compression(#[from] std::io::Error),

    #[error("Export failed: {0}")]
    Failed(String),
}

/// Serializes and ships a batch of queue items.
///
/// Implementations pick out the payload kinds they support and return
/// `Ok(())` without any I/O when nothing in the batch applies to them.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, items: &[EventQueueItem]) -> Result<(), ExportError>;

    /// Short label used in log lines
    fn name(&self) -> &str {
        "exporter"
    }
}
