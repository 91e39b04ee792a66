pub mod attributes;
pub mod log;
pub mod replay;
pub mod span;

pub use attributes::{merge_current_wins, AttributeValue, Attributes};
pub use log::{LogRecord, Severity};
pub use replay::{ScreenImageItem, TouchItemPayload, TouchKind};
pub use span::{SpanEvent, SpanKind, SpanRecord, SpanStatus};
