pub mod config;
pub mod exporters;
pub mod model;
pub mod pipeline;
pub mod sampling;
pub mod session;

// Re-exports for public API
pub use config::{Config, ConfigError};
pub use exporters::{ExportError, Exporter, MultiExporter, SamplingExporter};
pub use model::{AttributeValue, Attributes, LogRecord, ScreenImageItem, Severity, SpanRecord, TouchItemPayload};
pub use pipeline::{
    BatchWorker, BatchWorkerConfig, EventPayload, EventQueue, EventQueueItem, FlushableWorker, LogItem,
    SpanItem, TransportService,
};
pub use sampling::{ExportSampler, RuleSampler, SamplingConfig, SamplingResult};
pub use session::{FixedSession, SessionProvider};
