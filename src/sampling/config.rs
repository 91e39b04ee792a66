use serde::{Deserialize, Serialize};

use crate::model::AttributeValue;

/// Remote sampling configuration. Field names accept both snake_case (YAML)
/// and camelCase (remote JSON).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default)]
    pub spans: Vec<SpanSamplingRule>,

    #[serde(default)]
    pub logs: Vec<LogSamplingRule>,
}

impl SamplingConfig {
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty() && self.logs.is_empty()
    }
}

/// Exact or regex match on a string-like value. With neither set the
/// condition never matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    #[serde(default, alias = "matchValue", skip_serializing_if = "Option::is_none")]
    pub match_value: Option<AttributeValue>,

    #[serde(default, alias = "regexValue", skip_serializing_if = "Option::is_none")]
    pub regex_value: Option<String>,
}

impl MatchConfig {
    pub fn exact(value: impl Into<AttributeValue>) -> Self {
        Self {
            match_value: Some(value.into()),
            regex_value: None,
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            match_value: None,
            regex_value: Some(pattern.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMatch {
    pub key: MatchConfig,

    #[serde(alias = "attribute")]
    pub value: MatchConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanEventMatch {
    #[serde(default)]
    pub name: Option<MatchConfig>,

    #[serde(default)]
    pub attributes: Vec<AttributeMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanSamplingRule {
    #[serde(default)]
    pub name: Option<MatchConfig>,

    #[serde(default)]
    pub attributes: Vec<AttributeMatch>,

    #[serde(default)]
    pub events: Vec<SpanEventMatch>,

    /// Keep one record in N; 0 drops everything the rule matches
    #[serde(default = "default_ratio", alias = "samplingRatio")]
    pub sampling_ratio: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSamplingRule {
    #[serde(default)]
    pub message: Option<MatchConfig>,

    #[serde(default, alias = "severityText")]
    pub severity_text: Option<MatchConfig>,

    #[serde(default)]
    pub attributes: Vec<AttributeMatch>,

    #[serde(default = "default_ratio", alias = "samplingRatio")]
    pub sampling_ratio: u32,
}

fn default_ratio() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_json() {
        let json = r#"{
            "spans": [{
                "name": {"regexValue": "^GET .*"},
                "attributes": [{"key": {"matchValue": "http.route"}, "attribute": {"matchValue": "/health"}}],
                "samplingRatio": 10
            }],
            "logs": [{
                "severityText": {"matchValue": "DEBUG"},
                "samplingRatio": 0
            }]
        }"#;

        let config: SamplingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.spans.len(), 1);
        assert_eq!(config.spans[0].sampling_ratio, 10);
        assert_eq!(config.spans[0].name, Some(MatchConfig::regex("^GET .*")));
        assert_eq!(config.spans[0].attributes[0].value, MatchConfig::exact("/health"));
        assert_eq!(config.logs[0].sampling_ratio, 0);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
logs:
  - message:
      regex_value: "heartbeat"
    sampling_ratio: 100
"#;
        let config: SamplingConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.spans.is_empty());
        assert_eq!(config.logs[0].message, Some(MatchConfig::regex("heartbeat")));
        assert!(!config.is_empty());
    }

    #[test]
    fn test_ratio_defaults_to_one() {
        let rule: LogSamplingRule = serde_json::from_str("{}").unwrap();
        assert_eq!(rule.sampling_ratio, 1);
    }
}
