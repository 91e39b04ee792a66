use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use tracing::debug;

use super::item::EventQueueItem;

/// What to do when an enqueue would push the queue over its cost ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict from the head until the new item fits
    #[default]
    DropOldest,
    /// Discard the incoming item
    DropNewest,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueLimits {
    /// Ceiling on the summed cost of queued items; `None` means unbounded
    pub max_total_cost: Option<usize>,
    pub overflow: OverflowPolicy,
}

impl QueueLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(max_total_cost: usize, overflow: OverflowPolicy) -> Self {
        Self {
            max_total_cost: Some(max_total_cost),
            overflow,
        }
    }
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<EventQueueItem>,
    total_cost: usize,
    last_event_time: Option<SystemTime>,
}

/// FIFO buffer of telemetry items. Every operation takes the same lock, so
/// each call is atomic with respect to all others.
pub struct EventQueue {
    state: Mutex<QueueState>,
    limits: QueueLimits,
    dropped: AtomicU64,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self::with_limits(QueueLimits::unbounded())
    }

    pub fn with_limits(limits: QueueLimits) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            limits,
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // A panic while holding the lock cannot leave the deque half-mutated
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item to the tail. Never fails; with a cost ceiling configured
    /// items may be discarded according to the overflow policy.
    pub fn enqueue(&self, item: EventQueueItem) {
        let cost = item.cost();
        let mut evicted = 0u64;

        {
            let mut state = self.lock();
            state.last_event_time = Some(SystemTime::now());

            if let Some(max) = self.limits.max_total_cost {
                if cost > max {
                    drop(state);
                    self.record_drops(1, "item cost exceeds queue limit");
                    return;
                }

                match self.limits.overflow {
                    OverflowPolicy::DropNewest => {
                        if state.total_cost + cost > max {
                            drop(state);
                            self.record_drops(1, "queue full, dropping newest");
                            return;
                        }
                    }
                    OverflowPolicy::DropOldest => {
                        while state.total_cost + cost > max {
                            match state.items.pop_front() {
                                Some(oldest) => {
                                    state.total_cost -= oldest.cost();
                                    evicted += 1;
                                }
                                None => break,
                            }
                        }
                    }
                }
            }

            state.total_cost += cost;
            state.items.push_back(item);
        }

        if evicted > 0 {
            self.record_drops(evicted, "queue full, evicted oldest");
        }
    }

    /// Remove and return a prefix of the queue.
    ///
    /// Items are taken from the head while summing their cost. The scan stops
    /// after the item that reaches `max_count` or pushes the sum above
    /// `max_cost`; that item is included. If neither bound trips, the whole
    /// queue is returned.
    pub fn dequeue_batch(&self, max_cost: usize, max_count: usize) -> Vec<EventQueueItem> {
        if max_count == 0 {
            return Vec::new();
        }

        let mut state = self.lock();

        let mut sum = 0usize;
        let mut take = state.items.len();
        for (i, item) in state.items.iter().enumerate() {
            sum += item.cost();
            if i + 1 >= max_count || sum > max_cost {
                take = i + 1;
                break;
            }
        }

        let batch: Vec<EventQueueItem> = state.items.drain(..take).collect();
        let removed: usize = batch.iter().map(EventQueueItem::cost).sum();
        state.total_cost = state.total_cost.saturating_sub(removed);
        batch
    }

    pub fn dequeue_one(&self) -> Option<EventQueueItem> {
        let mut state = self.lock();
        let item = state.items.pop_front()?;
        state.total_cost = state.total_cost.saturating_sub(item.cost());
        Some(item)
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn total_cost(&self) -> usize {
        self.lock().total_cost
    }

    /// When the last enqueue happened, for diagnostics
    pub fn last_event_time(&self) -> Option<SystemTime> {
        self.lock().last_event_time
    }

    /// Items discarded by the overflow policy since creation
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn record_drops(&self, count: u64, reason: &'static str) {
        let total = self.dropped.fetch_add(count, Ordering::Relaxed) + count;
        debug!(dropped = count, total_dropped = total, reason, "Event queue overflow");
    }
}
