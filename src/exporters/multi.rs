use async_trait::async_trait;
use futures::future::join_all;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use super::{ExportError, Exporter};
use crate::pipeline::EventQueueItem;

/// Fans one batch out to every registered exporter concurrently.
///
/// Each `export` call works on a snapshot of the exporter list, so exporters
/// added while a batch is in flight only see the next one.
#[derive(Default)]
pub struct MultiExporter {
    exporters: RwLock<Vec<Arc<dyn Exporter>>>,
}

impl MultiExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exporters(exporters: Vec<Arc<dyn Exporter>>) -> Self {
        Self {
            exporters: RwLock::new(exporters),
        }
    }

    pub fn add_exporter(&self, exporter: Arc<dyn Exporter>) {
        debug!(exporter = exporter.name(), "Registering exporter");
        self.exporters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(exporter);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Exporter>> {
        self.exporters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Exporter for MultiExporter {
    /// Runs every exporter to completion. If any failed, the first error is
    /// returned; exporters that succeeded have already sent their data.
    async fn export(&self, items: &[EventQueueItem]) -> Result<(), ExportError> {
        let exporters = self.snapshot();
        if exporters.is_empty() {
            return Ok(());
        }

        let results = join_all(exporters.iter().map(|e| e.export(items))).await;

        let mut first_error = None;
        let mut failed = 0usize;
        for (exporter, result) in exporters.iter().zip(results) {
            if let Err(e) = result {
                failed += 1;
                warn!(exporter = exporter.name(), error = %e, items = items.len(), "Exporter failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => {
                debug!(failed, total = exporters.len(), "Fan-out export finished with failures");
                Err(e)
            }
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "multi"
    }
}
