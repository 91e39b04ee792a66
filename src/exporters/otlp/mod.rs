mod logs;
mod traces;
pub mod transform;

use crate::model::Attributes;

pub use logs::OtlpLogExporter;
pub use traces::OtlpTraceExporter;

#[derive(Debug, Clone)]
pub struct OtlpConfig {
    /// Collector base URL (e.g. "https://otlp.example.com:4318")
    pub endpoint: String,

    pub export_logs: bool,

    pub export_traces: bool,
}

impl Default for OtlpConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4318".to_string(),
            export_logs: true,
            export_traces: true,
        }
    }
}

impl OtlpConfig {
    pub fn logs_url(&self) -> String {
        format!("{}/v1/logs", self.endpoint.trim_end_matches('/'))
    }

    pub fn traces_url(&self) -> String {
        format!("{}/v1/traces", self.endpoint.trim_end_matches('/'))
    }
}

/// Identity of the instrumented application, sent as OTLP resource attributes.
#[derive(Debug, Clone, Default)]
pub struct ResourceInfo {
    pub service_name: String,
    pub service_version: Option<String>,
    pub attributes: Attributes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_urls() {
        let config = OtlpConfig {
            endpoint: "http://collector:4318/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.logs_url(), "http://collector:4318/v1/logs");
        assert_eq!(config.traces_url(), "http://collector:4318/v1/traces");
    }
}
