use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::batch_worker::{BatchWorker, BatchWorkerConfig};
use super::item::EventQueueItem;
use super::queue::EventQueue;
use crate::config::Config;
use crate::exporters::{ExportError, Exporter, Exporters, MultiExporter};
use crate::sampling::{ExportSampler, RuleSampler, SamplingConfigClient, SamplingConfigError};
use crate::session::{FixedSession, SessionProvider};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to build exporter: {0}")]
    Exporter(#[from] ExportError),

    #[error("Failed to build sampling config client: {0}")]
    Sampling(#[from] SamplingConfigError),
}

/// Top-level handle for the pipeline: producers enqueue, one batch worker
/// drains into the shared multi-exporter.
pub struct TransportService {
    queue: Arc<EventQueue>,
    exporter: Arc<MultiExporter>,
    worker: BatchWorker,
    session: Arc<dyn SessionProvider>,
    sampler: Arc<dyn ExportSampler>,
    remote: Option<Arc<SamplingConfigClient>>,
    remote_handle: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl TransportService {
    pub fn new(
        queue: Arc<EventQueue>,
        exporter: Arc<MultiExporter>,
        session: Arc<dyn SessionProvider>,
        sampler: Arc<dyn ExportSampler>,
        config: BatchWorkerConfig,
    ) -> Self {
        let worker = BatchWorker::new(queue.clone(), exporter.clone(), config);

        Self {
            queue,
            exporter,
            worker,
            session,
            sampler,
            remote: None,
            remote_handle: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Build the queue, exporters and sampler described by `config`.
    /// Nothing runs until `start()`.
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let session: Arc<dyn SessionProvider> = match config.service.session_id {
            Some(ref id) => Arc::new(FixedSession::new(id.clone())),
            None => Arc::new(FixedSession::random()),
        };

        let sampler: Arc<dyn ExportSampler> = Arc::new(RuleSampler::new());
        if !config.sampling.rules.is_empty() {
            sampler.set_config(Some(config.sampling.rules.clone()));
        }

        let exporters = Exporters::init(config, session.clone(), sampler.clone())?;
        let exporter = Arc::new(MultiExporter::with_exporters(exporters));
        let queue = Arc::new(EventQueue::with_limits(config.queue.to_runtime_config()));

        let mut service = Self::new(
            queue,
            exporter,
            session,
            sampler,
            config.batch.to_runtime_config(),
        );

        if let Some(ref remote) = config.sampling.remote {
            let client = SamplingConfigClient::new(remote.to_runtime_config())?;
            service.remote = Some(Arc::new(client));
        }

        Ok(service)
    }

    /// Start the batch worker. The remote sampling config is fetched once,
    /// on the first start.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(ref remote) = self.remote {
            let mut handle = self.remote_handle.lock().unwrap_or_else(PoisonError::into_inner);
            if handle.is_none() {
                *handle = Some(remote.clone().spawn_refresh(self.sampler.clone()));
            }
        }

        self.worker.start();
        info!(
            session_id = %self.session.session_id(),
            exporters = self.exporter.len(),
            "Transport started"
        );
    }

    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        self.worker.stop();
        info!("Transport stopped");
    }

    /// Stop the worker, wait for its current pass (also one left running by
    /// an earlier `stop()`), then export whatever is still queued. Returns the number of items exported by the final drain.
    pub async fn shutdown(&self) -> usize {
        self.started.store(false, Ordering::SeqCst);
        self.worker.shutdown().await;

        let fetch = self
            .remote_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(fetch) = fetch {
            fetch.abort();
        }

        let remaining = self.queue.len();
        debug!(items = remaining, "Draining queue on shutdown");
        self.worker.drain_now().await
    }

    pub fn flush(&self) {
        self.worker.flush();
    }

    pub fn enqueue(&self, item: EventQueueItem) {
        self.queue.enqueue(item);
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    /// Takes effect from the next export cycle.
    pub fn add_exporter(&self, exporter: Arc<dyn Exporter>) {
        self.exporter.add_exporter(exporter);
    }

    pub fn session(&self) -> &Arc<dyn SessionProvider> {
        &self.session
    }

    pub fn sampler(&self) -> &Arc<dyn ExportSampler> {
        &self.sampler
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}
