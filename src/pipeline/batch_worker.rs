use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::flushable::{FlushableWorker, Tick, WorkerTask};
use super::item::EventQueueItem;
use super::queue::EventQueue;
use crate::exporters::Exporter;

#[derive(Debug, Clone)]
pub struct BatchWorkerConfig {
    /// Cost at which a batch is cut (the item crossing it is included)
    pub max_batch_cost: usize,
    pub max_batch_count: usize,
    /// Sleep between drain passes once the queue is empty
    pub idle_interval: Duration,
}

impl Default for BatchWorkerConfig {
    fn default() -> Self {
        Self {
            max_batch_cost: 30_000,
            max_batch_count: 20,
            idle_interval: Duration::from_secs(2),
        }
    }
}

struct DrainTask {
    queue: Arc<EventQueue>,
    exporter: Arc<dyn Exporter>,
    config: BatchWorkerConfig,
    /// Held for a whole pass; scheduled passes and `drain_now` take turns
    pass: AsyncMutex<()>,
}

impl DrainTask {
    /// Export batches until the queue is empty or `keep_going` says stop.
    /// Returns the number of items handed to the exporter.
    async fn drain(&self, keep_going: impl Fn() -> bool, is_flushing: bool) -> usize {
        let _pass = self.pass.lock().await;
        let mut exported = 0usize;

        while keep_going() {
            let batch = self
                .queue
                .dequeue_batch(self.config.max_batch_cost, self.config.max_batch_count);
            if batch.is_empty() {
                break;
            }

            exported += batch.len();
            self.export_batch(batch, is_flushing).await;
        }

        exported
    }

    async fn export_batch(&self, batch: Vec<EventQueueItem>, is_flushing: bool) {
        let count = batch.len();
        let cost: usize = batch.iter().map(EventQueueItem::cost).sum();
        let start = Instant::now();

        match self.exporter.export(&batch).await {
            Ok(()) => {
                debug!(
                    items = count,
                    cost,
                    is_flushing,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Exported batch"
                );
            }
            Err(e) => {
                // At-most-once: the batch is not re-queued
                warn!(
                    error = %e,
                    items = count,
                    cost,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Export failed, batch dropped"
                );
            }
        }
    }
}

#[async_trait]
impl WorkerTask for DrainTask {
    async fn run(&self, tick: Tick) {
        self.drain(|| !tick.is_cancelled(), tick.is_flushing).await;
    }
}

/// Background consumer that moves queued items into an exporter.
///
/// Each pass drains the queue in cost/count-bounded batches without pausing,
/// then the worker idles for `idle_interval`. `flush()` starts a pass
/// immediately. Producers never wait on it.
pub struct BatchWorker {
    drain: Arc<DrainTask>,
    worker: FlushableWorker,
}

impl BatchWorker {
    pub fn new(queue: Arc<EventQueue>, exporter: Arc<dyn Exporter>, config: BatchWorkerConfig) -> Self {
        let interval = config.idle_interval;
        let drain = Arc::new(DrainTask {
            queue,
            exporter,
            config,
            pass: AsyncMutex::new(()),
        });
        let worker = FlushableWorker::new("batch-worker", interval, drain.clone());

        Self { drain, worker }
    }

    pub fn start(&self) {
        self.worker.start();
    }

    /// Stop scheduling passes. An export already in flight is not awaited
    /// here; `shutdown()` still waits for it.
    pub fn stop(&self) {
        self.worker.stop();
    }

    /// Stop and wait for the current pass to finish.
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
    }

    pub fn flush(&self) {
        self.worker.flush();
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Drain the queue on the caller's task, ignoring the worker state.
    /// Waits for a pass already in progress. Used for the final flush on
    /// shutdown.
    pub async fn drain_now(&self) -> usize {
        let exported = self.drain.drain(|| true, true).await;
        info!(items = exported, "Final drain complete");
        exported
    }

    pub fn config(&self) -> &BatchWorkerConfig {
        &self.drain.config
    }
}
