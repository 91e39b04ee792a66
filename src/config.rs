use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::exporters::{HttpClientConfig, OtlpConfig, ReplayConfig, ResourceInfo};
use crate::model::{AttributeValue, Attributes};
use crate::pipeline::{BatchWorkerConfig, OverflowPolicy, QueueLimits};
use crate::sampling::{RemoteSamplingConfig, SamplingConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub exporters: ExportersConfig,

    #[serde(default)]
    pub sampling: SamplingSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,

    /// Fixed session id; a random one is generated when unset
    #[serde(default)]
    pub session_id: Option<String>,

    /// Extra resource attributes sent with every OTLP request
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            version: None,
            session_id: None,
            attributes: HashMap::new(),
        }
    }
}

fn default_service_name() -> String {
    "unknown_service".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct QueueConfig {
    /// Cap on the summed cost of queued items (unbounded when unset)
    #[serde(default)]
    pub max_total_cost: Option<usize>,

    #[serde(default)]
    pub overflow: OverflowPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_max_cost")]
    pub max_cost: usize,

    #[serde(default = "default_batch_max_count")]
    pub max_count: usize,

    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_cost: default_batch_max_cost(),
            max_count: default_batch_max_count(),
            idle_interval_ms: default_idle_interval_ms(),
        }
    }
}

fn default_batch_max_cost() -> usize {
    30_000
}

fn default_batch_max_count() -> usize {
    20
}

fn default_idle_interval_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExportersConfig {
    #[serde(default)]
    pub otlp: Option<OtlpExporterConfig>,

    #[serde(default)]
    pub replay: Option<ReplayExporterConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtlpExporterConfig {
    /// Collector base URL (e.g., "http://collector:4318")
    pub endpoint: String,

    /// Static headers, e.g. API keys
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_true")]
    pub compression: bool,

    #[serde(default = "default_compression_threshold_bytes")]
    pub compression_threshold_bytes: usize,

    #[serde(default = "default_true")]
    pub logs: bool,

    #[serde(default = "default_true")]
    pub traces: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayExporterConfig {
    /// Full ingest URL of the session-replay backend
    pub endpoint: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_true")]
    pub compression: bool,

    #[serde(default = "default_compression_threshold_bytes")]
    pub compression_threshold_bytes: usize,
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_compression_threshold_bytes() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SamplingSection {
    /// Rules applied from startup, before any remote config arrives
    #[serde(default, flatten)]
    pub rules: SamplingConfig,

    #[serde(default)]
    pub remote: Option<RemoteSamplingSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSamplingSettings {
    pub endpoint: String,

    pub project_id: String,

    #[serde(default = "default_remote_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_remote_timeout_ms() -> u64 {
    5_000
}

impl ServiceConfig {
    pub fn to_resource_info(&self) -> ResourceInfo {
        let attributes: Attributes = self.attributes.clone();
        ResourceInfo {
            service_name: self.name.clone(),
            service_version: self.version.clone(),
            attributes,
        }
    }
}

impl QueueConfig {
    pub fn to_runtime_config(&self) -> QueueLimits {
        match self.max_total_cost {
            Some(max) => QueueLimits::bounded(max, self.overflow),
            None => QueueLimits::unbounded(),
        }
    }
}

impl BatchConfig {
    pub fn to_runtime_config(&self) -> BatchWorkerConfig {
        BatchWorkerConfig {
            max_batch_cost: self.max_cost,
            max_batch_count: self.max_count,
            idle_interval: Duration::from_millis(self.idle_interval_ms),
        }
    }
}

impl OtlpExporterConfig {
    pub fn to_runtime_config(&self) -> OtlpConfig {
        OtlpConfig {
            endpoint: self.endpoint.clone(),
            export_logs: self.logs,
            export_traces: self.traces,
        }
    }

    pub fn to_http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            headers: self.headers.clone(),
            compression: self.compression,
            compression_threshold_bytes: self.compression_threshold_bytes,
            ..Default::default()
        }
    }
}

impl ReplayExporterConfig {
    pub fn to_runtime_config(&self) -> ReplayConfig {
        ReplayConfig {
            endpoint: self.endpoint.clone(),
        }
    }

    pub fn to_http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            headers: self.headers.clone(),
            compression: self.compression,
            compression_threshold_bytes: self.compression_threshold_bytes,
            ..Default::default()
        }
    }
}

impl RemoteSamplingSettings {
    pub fn to_runtime_config(&self) -> RemoteSamplingConfig {
        RemoteSamplingConfig {
            endpoint: self.endpoint.clone(),
            project_id: self.project_id.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

impl Config {
    /// Load config from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    /// Load config from YAML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.max_count == 0 {
            return Err(ConfigError::Validation(
                "batch.max_count must be greater than 0".to_string(),
            ));
        }
        if self.batch.max_cost == 0 {
            return Err(ConfigError::Validation(
                "batch.max_cost must be greater than 0".to_string(),
            ));
        }
        if self.batch.idle_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "batch.idle_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.queue.max_total_cost == Some(0) {
            return Err(ConfigError::Validation(
                "queue.max_total_cost must be greater than 0 when set".to_string(),
            ));
        }

        if let Some(ref otlp) = self.exporters.otlp {
            validate_url("exporters.otlp.endpoint", &otlp.endpoint)?;
            if !otlp.logs && !otlp.traces {
                return Err(ConfigError::Validation(
                    "OTLP exporter must enable at least one of logs or traces".to_string(),
                ));
            }
        }

        if let Some(ref replay) = self.exporters.replay {
            validate_url("exporters.replay.endpoint", &replay.endpoint)?;
        }

        if let Some(ref remote) = self.sampling.remote {
            validate_url("sampling.remote.endpoint", &remote.endpoint)?;
            if remote.project_id.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "sampling.remote.project_id must not be empty".to_string(),
                ));
            }
        }

        for rule in &self.sampling.rules.spans {
            if let Some(pattern) = rule.name.as_ref().and_then(|m| m.regex_value.as_deref()) {
                validate_regex("sampling.spans[].name", pattern)?;
            }
        }
        for rule in &self.sampling.rules.logs {
            if let Some(pattern) = rule.message.as_ref().and_then(|m| m.regex_value.as_deref()) {
                validate_regex("sampling.logs[].message", pattern)?;
            }
        }

        Ok(())
    }

    /// Print the configuration (header values are not logged)
    pub fn print_config(&self) {
        info!("Service: {}", self.service.name);
        if let Some(ref version) = self.service.version {
            info!("  Version: {}", version);
        }

        match self.queue.max_total_cost {
            Some(max) => info!("Queue: max_total_cost={}, overflow={:?}", max, self.queue.overflow),
            None => info!("Queue: unbounded"),
        }
        info!(
            "Batch: max_cost={}, max_count={}, idle_interval={}ms",
            self.batch.max_cost, self.batch.max_count, self.batch.idle_interval_ms
        );

        if let Some(ref otlp) = self.exporters.otlp {
            info!(
                "OTLP exporter: {} (logs={}, traces={}, compression={})",
                otlp.endpoint, otlp.logs, otlp.traces, otlp.compression
            );
            if !otlp.headers.is_empty() {
                info!("  Headers: {} configured", otlp.headers.len());
            }
        }

        if let Some(ref replay) = self.exporters.replay {
            info!("Replay exporter: {}", replay.endpoint);
        }

        info!(
            "Sampling: {} span rules, {} log rules",
            self.sampling.rules.spans.len(),
            self.sampling.rules.logs.len()
        );
        if let Some(ref remote) = self.sampling.remote {
            info!("  Remote config: {} (project {})", remote.endpoint, remote.project_id);
        }
    }
}

fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::Validation(format!("{} is not a valid URL ({}): {}", field, value, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Validation(format!(
            "{} must use http or https, got '{}'",
            field, other
        ))),
    }
}

fn validate_regex(field: &str, pattern: &str) -> Result<(), ConfigError> {
    regex::Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::Validation(format!("{} has an invalid regex: {}", field, e)))
}
