use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::model::{LogRecord, ScreenImageItem, SpanRecord, TouchItemPayload};

pub const LOG_ITEM_COST: usize = 300;
pub const SPAN_ITEM_COST: usize = 300;
pub const TOUCH_ITEM_COST: usize = 300;

/// Anything that can travel through the event queue.
///
/// `cost` is a proxy for serialized size and drives batch admission.
/// `as_any` lets exporters pick out the payload kinds they understand.
pub trait EventPayload: Any + Send + Sync + fmt::Debug {
    fn cost(&self) -> usize;

    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogItem {
    pub record: LogRecord,
}

impl LogItem {
    pub fn new(record: LogRecord) -> Self {
        Self { record }
    }
}

impl EventPayload for LogItem {
    fn cost(&self) -> usize {
        LOG_ITEM_COST
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpanItem {
    pub record: SpanRecord,
}

impl SpanItem {
    pub fn new(record: SpanRecord) -> Self {
        Self { record }
    }
}

impl EventPayload for SpanItem {
    fn cost(&self) -> usize {
        SPAN_ITEM_COST
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl EventPayload for TouchItemPayload {
    fn cost(&self) -> usize {
        TOUCH_ITEM_COST
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl EventPayload for ScreenImageItem {
    fn cost(&self) -> usize {
        self.data.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A payload stamped with its capture time. Immutable once built; clones
/// share the payload.
#[derive(Debug, Clone)]
pub struct EventQueueItem {
    timestamp: SystemTime,
    payload: Arc<dyn EventPayload>,
}

impl EventQueueItem {
    pub fn new<P: EventPayload>(payload: P) -> Self {
        Self::with_timestamp(payload, SystemTime::now())
    }

    pub fn with_timestamp<P: EventPayload>(payload: P, timestamp: SystemTime) -> Self {
        Self {
            timestamp,
            payload: Arc::new(payload),
        }
    }

    pub fn from_shared(payload: Arc<dyn EventPayload>, timestamp: SystemTime) -> Self {
        Self { timestamp, payload }
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Capture time in milliseconds since the Unix epoch
    pub fn timestamp_millis(&self) -> u64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }

    pub fn cost(&self) -> usize {
        self.payload.cost()
    }

    pub fn payload(&self) -> &dyn EventPayload {
        self.payload.as_ref()
    }

    pub fn downcast<T: EventPayload>(&self) -> Option<&T> {
        self.payload.as_any().downcast_ref::<T>()
    }
}
