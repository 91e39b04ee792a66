use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{info, warn};

use super::config::{AttributeMatch, LogSamplingRule, MatchConfig, SamplingConfig, SpanEventMatch, SpanSamplingRule};
use super::{ExportSampler, SamplingResult};
use crate::model::{AttributeValue, Attributes, LogRecord, SpanRecord};

/// Attribute added to kept records that matched a rule, carrying its ratio so
/// the backend can re-weight counts.
pub const SAMPLING_RATIO_ATTRIBUTE: &str = "sampling.ratio";

enum Matcher {
    Exact(AttributeValue),
    Pattern(Regex),
    Never,
}

impl Matcher {
    fn compile(config: &MatchConfig) -> Self {
        if let Some(ref value) = config.match_value {
            return Matcher::Exact(value.clone());
        }
        match config.regex_value {
            Some(ref pattern) => match Regex::new(pattern) {
                Ok(re) => Matcher::Pattern(re),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "Invalid sampling regex, condition disabled");
                    Matcher::Never
                }
            },
            None => Matcher::Never,
        }
    }

    fn matches_str(&self, s: &str) -> bool {
        match self {
            Matcher::Exact(AttributeValue::String(expected)) => expected == s,
            Matcher::Exact(_) => false,
            Matcher::Pattern(re) => re.is_match(s),
            Matcher::Never => false,
        }
    }

    fn matches_value(&self, value: &AttributeValue) -> bool {
        match self {
            Matcher::Exact(expected) => expected == value,
            Matcher::Pattern(re) => re.is_match(&value.to_string()),
            Matcher::Never => false,
        }
    }
}

struct AttributeMatcher {
    key: Matcher,
    value: Matcher,
}

impl AttributeMatcher {
    fn compile(config: &AttributeMatch) -> Self {
        Self {
            key: Matcher::compile(&config.key),
            value: Matcher::compile(&config.value),
        }
    }

    fn matches(&self, attributes: &Attributes) -> bool {
        attributes
            .iter()
            .any(|(k, v)| self.key.matches_str(k) && self.value.matches_value(v))
    }
}

fn all_attributes_match(matchers: &[AttributeMatcher], attributes: &Attributes) -> bool {
    matchers.iter().all(|m| m.matches(attributes))
}

struct EventMatcher {
    name: Option<Matcher>,
    attributes: Vec<AttributeMatcher>,
}

impl EventMatcher {
    fn compile(config: &SpanEventMatch) -> Self {
        Self {
            name: config.name.as_ref().map(Matcher::compile),
            attributes: config.attributes.iter().map(AttributeMatcher::compile).collect(),
        }
    }

    fn matches(&self, span: &SpanRecord) -> bool {
        span.events.iter().any(|event| {
            self.name.as_ref().map_or(true, |m| m.matches_str(&event.name))
                && all_attributes_match(&self.attributes, &event.attributes)
        })
    }
}

struct SpanRule {
    name: Option<Matcher>,
    attributes: Vec<AttributeMatcher>,
    events: Vec<EventMatcher>,
    ratio: u32,
}

impl SpanRule {
    fn compile(config: &SpanSamplingRule) -> Self {
        Self {
            name: config.name.as_ref().map(Matcher::compile),
            attributes: config.attributes.iter().map(AttributeMatcher::compile).collect(),
            events: config.events.iter().map(EventMatcher::compile).collect(),
            ratio: config.sampling_ratio,
        }
    }

    fn matches(&self, span: &SpanRecord) -> bool {
        self.name.as_ref().map_or(true, |m| m.matches_str(&span.name))
            && all_attributes_match(&self.attributes, &span.attributes)
            && self.events.iter().all(|m| m.matches(span))
    }
}

struct LogRule {
    message: Option<Matcher>,
    severity_text: Option<Matcher>,
    attributes: Vec<AttributeMatcher>,
    ratio: u32,
}

impl LogRule {
    fn compile(config: &LogSamplingRule) -> Self {
        Self {
            message: config.message.as_ref().map(Matcher::compile),
            severity_text: config.severity_text.as_ref().map(Matcher::compile),
            attributes: config.attributes.iter().map(AttributeMatcher::compile).collect(),
            ratio: config.sampling_ratio,
        }
    }

    fn matches(&self, record: &LogRecord) -> bool {
        self.message.as_ref().map_or(true, |m| m.matches_str(&record.body))
            && self
                .severity_text
                .as_ref()
                .map_or(true, |m| m.matches_str(record.severity.as_str()))
            && all_attributes_match(&self.attributes, &record.attributes)
    }
}

struct CompiledConfig {
    spans: Vec<SpanRule>,
    logs: Vec<LogRule>,
}

impl CompiledConfig {
    fn compile(config: &SamplingConfig) -> Self {
        Self {
            spans: config.spans.iter().map(SpanRule::compile).collect(),
            logs: config.logs.iter().map(LogRule::compile).collect(),
        }
    }
}

/// Rule-driven sampler: the first rule matching a record decides with
/// probability `1 / sampling_ratio`; records matching no rule are kept.
pub struct RuleSampler {
    config: RwLock<Option<Arc<CompiledConfig>>>,
    rng: Mutex<StdRng>,
}

impl Default for RuleSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSampler {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic sampler for tests and reproducible runs
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            config: RwLock::new(None),
            rng: Mutex::new(rng),
        }
    }

    fn current(&self) -> Option<Arc<CompiledConfig>> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn decide(&self, ratio: u32) -> SamplingResult {
        let keep = match ratio {
            0 => false,
            1 => true,
            n => self
                .rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .gen_range(0..n)
                == 0,
        };

        if keep {
            let mut attributes = Attributes::new();
            attributes.insert(
                SAMPLING_RATIO_ATTRIBUTE.to_string(),
                AttributeValue::Int(ratio as i64),
            );
            SamplingResult::keep_with(attributes)
        } else {
            SamplingResult::discard()
        }
    }
}

impl ExportSampler for RuleSampler {
    fn sample_span(&self, span: &SpanRecord) -> SamplingResult {
        let Some(config) = self.current() else {
            return SamplingResult::keep();
        };
        match config.spans.iter().find(|rule| rule.matches(span)) {
            Some(rule) => self.decide(rule.ratio),
            None => SamplingResult::keep(),
        }
    }

    fn sample_log(&self, record: &LogRecord) -> SamplingResult {
        let Some(config) = self.current() else {
            return SamplingResult::keep();
        };
        match config.logs.iter().find(|rule| rule.matches(record)) {
            Some(rule) => self.decide(rule.ratio),
            None => SamplingResult::keep(),
        }
    }

    fn is_sampling_enabled(&self) -> bool {
        self.current()
            .map(|c| !c.spans.is_empty() || !c.logs.is_empty())
            .unwrap_or(false)
    }

    fn set_config(&self, config: Option<SamplingConfig>) {
        let compiled = config.as_ref().map(|c| Arc::new(CompiledConfig::compile(c)));
        match config {
            Some(ref c) => info!(span_rules = c.spans.len(), log_rules = c.logs.len(), "Sampling config updated"),
            None => info!("Sampling config cleared"),
        }
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = compiled;
    }
}
