//! Per-record keep/drop decisions for logs and spans.
//!
//! An [`ExportSampler`] decides; the helpers here apply a decision to a record,
//! merging any sampler-supplied attributes underneath the record's own.

pub mod config;
pub mod remote;
mod rules;

use crate::model::{merge_current_wins, Attributes, LogRecord, SpanRecord};

pub use config::{AttributeMatch, LogSamplingRule, MatchConfig, SamplingConfig, SpanEventMatch, SpanSamplingRule};
pub use remote::{RemoteSamplingConfig, SamplingConfigClient, SamplingConfigError};
pub use rules::{RuleSampler, SAMPLING_RATIO_ATTRIBUTE};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SamplingResult {
    pub sample: bool,
    /// Attributes to add to a kept record
    pub attributes: Option<Attributes>,
}

impl SamplingResult {
    pub fn keep() -> Self {
        Self {
            sample: true,
            attributes: None,
        }
    }

    pub fn keep_with(attributes: Attributes) -> Self {
        Self {
            sample: true,
            attributes: Some(attributes),
        }
    }

    pub fn discard() -> Self {
        Self {
            sample: false,
            attributes: None,
        }
    }
}

/// Sampling strategy consulted by the sampling exporters. `set_config` may be
/// called at any time; decisions already in progress may see either config.
pub trait ExportSampler: Send + Sync {
    fn sample_span(&self, span: &SpanRecord) -> SamplingResult;

    fn sample_log(&self, record: &LogRecord) -> SamplingResult;

    fn is_sampling_enabled(&self) -> bool;

    fn set_config(&self, config: Option<SamplingConfig>);
}

pub(crate) enum Verdict {
    Drop,
    Keep,
    KeepMerged(Attributes),
}

pub(crate) fn verdict(result: SamplingResult, current: &Attributes) -> Verdict {
    if !result.sample {
        return Verdict::Drop;
    }
    match result.attributes {
        Some(overlay) if !overlay.is_empty() => {
            Verdict::KeepMerged(merge_current_wins(current, &overlay))
        }
        _ => Verdict::Keep,
    }
}

/// Apply the sampler to one log record. Returns `None` when dropped.
pub fn sample_log(sampler: &dyn ExportSampler, record: LogRecord) -> Option<LogRecord> {
    if !sampler.is_sampling_enabled() {
        return Some(record);
    }
    match verdict(sampler.sample_log(&record), &record.attributes) {
        Verdict::Drop => None,
        Verdict::Keep => Some(record),
        Verdict::KeepMerged(attributes) => Some(LogRecord {
            attributes,
            ..record
        }),
    }
}

pub fn sample_span(sampler: &dyn ExportSampler, span: SpanRecord) -> Option<SpanRecord> {
    if !sampler.is_sampling_enabled() {
        return Some(span);
    }
    match verdict(sampler.sample_span(&span), &span.attributes) {
        Verdict::Drop => None,
        Verdict::Keep => Some(span),
        Verdict::KeepMerged(attributes) => Some(SpanRecord { attributes, ..span }),
    }
}

/// Filter a batch of log records, preserving order.
pub fn sample_logs(sampler: &dyn ExportSampler, records: Vec<LogRecord>) -> Vec<LogRecord> {
    if !sampler.is_sampling_enabled() {
        return records;
    }
    records
        .into_iter()
        .filter_map(|record| sample_log(sampler, record))
        .collect()
}

pub fn sample_spans(sampler: &dyn ExportSampler, spans: Vec<SpanRecord>) -> Vec<SpanRecord> {
    if !sampler.is_sampling_enabled() {
        return spans;
    }
    spans
        .into_iter()
        .filter_map(|span| sample_span(sampler, span))
        .collect()
}
