use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{ExportError, Exporter};
use crate::model::{LogRecord, SpanRecord};
use crate::pipeline::{EventQueueItem, LogItem, SpanItem};
use crate::sampling::{verdict, ExportSampler, Verdict};

/// Which records a [`SamplingExporter`] consults the sampler for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampledKind {
    Logs,
    Spans,
    #[default]
    All,
}

impl SampledKind {
    fn logs(self) -> bool {
        matches!(self, SampledKind::Logs | SampledKind::All)
    }

    fn spans(self) -> bool {
        matches!(self, SampledKind::Spans | SampledKind::All)
    }
}

/// Wraps an exporter and samples the log and span records in each batch
/// before handing it on. Other payload kinds pass through untouched, as do
/// records outside the configured [`SampledKind`].
///
/// When sampling leaves nothing, the inner exporter is not called.
pub struct SamplingExporter {
    inner: Arc<dyn Exporter>,
    sampler: Arc<dyn ExportSampler>,
    kind: SampledKind,
    name: String,
}

impl SamplingExporter {
    pub fn new(inner: Arc<dyn Exporter>, sampler: Arc<dyn ExportSampler>) -> Self {
        let name = format!("sampled-{}", inner.name());
        Self {
            inner,
            sampler,
            kind: SampledKind::All,
            name,
        }
    }

    /// Restrict sampling to the records the inner exporter consumes.
    pub fn with_kind(mut self, kind: SampledKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn kind(&self) -> SampledKind {
        self.kind
    }

    fn sample_item(&self, item: &EventQueueItem) -> Option<EventQueueItem> {
        if let Some(log) = item.downcast::<LogItem>().filter(|_| self.kind.logs()) {
            return match verdict(self.sampler.sample_log(&log.record), &log.record.attributes) {
                Verdict::Drop => None,
                Verdict::Keep => Some(item.clone()),
                Verdict::KeepMerged(attributes) => Some(EventQueueItem::with_timestamp(
                    LogItem::new(LogRecord {
                        attributes,
                        ..log.record.clone()
                    }),
                    item.timestamp(),
                )),
            };
        }

        if let Some(span) = item.downcast::<SpanItem>().filter(|_| self.kind.spans()) {
            return match verdict(self.sampler.sample_span(&span.record), &span.record.attributes) {
                Verdict::Drop => None,
                Verdict::Keep => Some(item.clone()),
                Verdict::KeepMerged(attributes) => Some(EventQueueItem::with_timestamp(
                    SpanItem::new(SpanRecord {
                        attributes,
                        ..span.record.clone()
                    }),
                    item.timestamp(),
                )),
            };
        }

        Some(item.clone())
    }
}

#[async_trait]
impl Exporter for SamplingExporter {
    async fn export(&self, items: &[EventQueueItem]) -> Result<(), ExportError> {
        if !self.sampler.is_sampling_enabled() {
            return self.inner.export(items).await;
        }

        let sampled: Vec<EventQueueItem> =
            items.iter().filter_map(|item| self.sample_item(item)).collect();

        if sampled.len() < items.len() {
            debug!(
                exporter = self.inner.name(),
                kind = ?self.kind,
                kept = sampled.len(),
                dropped = items.len() - sampled.len(),
                "Sampled batch"
            );
        }

        if sampled.is_empty() {
            return Ok(());
        }

        self.inner.export(&sampled).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
