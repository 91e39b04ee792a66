//! Queue, workers and the transport service that ties them to the exporters.

mod batch_worker;
mod flushable;
mod item;
mod queue;
mod transport;

pub use batch_worker::{BatchWorker, BatchWorkerConfig};
pub use flushable::{FlushableWorker, Tick, WorkerTask};
pub use item::{EventPayload, EventQueueItem, LogItem, SpanItem, LOG_ITEM_COST, SPAN_ITEM_COST, TOUCH_ITEM_COST};
pub use queue::{EventQueue, OverflowPolicy, QueueLimits};
pub use transport::{TransportError, TransportService};
