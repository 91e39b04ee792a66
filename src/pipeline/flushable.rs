use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Passed to every callback invocation.
#[derive(Debug, Clone)]
pub struct Tick {
    pub is_flushing: bool,
    cancel: CancellationToken,
}

impl Tick {
    /// True once `stop()` has been requested. Long callbacks check this
    /// between units of work.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Work driven by a [`FlushableWorker`].
#[async_trait]
pub trait WorkerTask: Send + Sync + 'static {
    async fn run(&self, tick: Tick);
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic ticker with an on-demand flush.
///
/// Callback invocations never overlap, including across `stop()`/`start()`
/// cycles: every loop generation takes the same run gate before calling the
/// task, so a restarted loop waits for a callback the previous one left in
/// flight. Flush requests are coalesced through a single `Notify` permit: however many
/// arrive while one is pending or executing, at most one extra invocation runs.
pub struct FlushableWorker {
    name: String,
    interval: Duration,
    task: Arc<dyn WorkerTask>,
    flush_notify: Arc<Notify>,
    run_gate: Arc<AsyncMutex<()>>,
    running: Mutex<Option<Running>>,
    /// Loops cancelled by `stop()` that may still be inside a callback
    stopped: Mutex<Vec<JoinHandle<()>>>,
}

impl FlushableWorker {
    pub fn new(name: impl Into<String>, interval: Duration, task: Arc<dyn WorkerTask>) -> Self {
        Self {
            name: name.into(),
            interval,
            task,
            flush_notify: Arc::new(Notify::new()),
            run_gate: Arc::new(AsyncMutex::new(())),
            running: Mutex::new(None),
            stopped: Mutex::new(Vec::new()),
        }
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stopped(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the loop. No-op while already running. Must be called from
    /// within a Tokio runtime.
    pub fn start(&self) {
        let mut running = self.running();
        if running.is_some() {
            debug!(worker = %self.name, "Worker already running");
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.name.clone(),
            self.interval,
            Arc::clone(&self.task),
            Arc::clone(&self.flush_notify),
            Arc::clone(&self.run_gate),
            cancel.clone(),
        ));

        *running = Some(Running { cancel, handle });
    }

    /// Cancel the loop without waiting for it. An in-flight callback runs to
    /// completion; no new one starts. The handle is kept so `shutdown()` can
    /// still wait for that callback.
    pub fn stop(&self) {
        if let Some(running) = self.running().take() {
            running.cancel.cancel();
            let mut stopped = self.stopped();
            stopped.retain(|handle| !handle.is_finished());
            stopped.push(running.handle);
        }
    }

    /// Cancel the loop and wait for every in-flight callback, including one
    /// left running by an earlier `stop()`.
    pub async fn shutdown(&self) {
        let mut handles = std::mem::take(&mut *self.stopped());
        if let Some(running) = self.running().take() {
            running.cancel.cancel();
            handles.push(running.handle);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(worker = %self.name, error = %e, "Worker task panicked");
            }
        }
    }

    /// Request an out-of-band callback with `is_flushing = true`.
    pub fn flush(&self) {
        self.flush_notify.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running().is_some()
    }
}

impl Drop for FlushableWorker {
    fn drop(&mut self) {
        if let Some(running) = self.running().take() {
            running.cancel.cancel();
        }
    }
}

async fn run_loop(
    name: String,
    interval: Duration,
    task: Arc<dyn WorkerTask>,
    flush_notify: Arc<Notify>,
    run_gate: Arc<AsyncMutex<()>>,
    cancel: CancellationToken,
) {
    info!(worker = %name, interval_ms = interval.as_millis() as u64, "Worker started");

    loop {
        // Cancellation is polled first so a stopped worker never starts
        // another callback
        let is_flushing = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = flush_notify.notified() => true,
            _ = tokio::time::sleep(interval) => false,
        };

        // A previous generation may still be inside the callback
        let _running = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            guard = run_gate.lock() => guard,
        };

        if cancel.is_cancelled() {
            break;
        }

        task.run(Tick {
            is_flushing,
            cancel: cancel.clone(),
        })
        .await;
    }

    info!(worker = %name, "Worker stopped");
}
