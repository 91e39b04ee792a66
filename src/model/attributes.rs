use opentelemetry_proto::tonic::common::v1::{
    any_value::Value, AnyValue, ArrayValue, KeyValue, KeyValueList,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub type Attributes = HashMap<String, AttributeValue>;

/// Attribute value carried by log records, spans and span events.
///
/// Untagged on the serde side so JSON scalars, arrays and objects map onto
/// the matching variant directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Array(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_any_value(&self) -> AnyValue {
        let value = match self {
            AttributeValue::String(s) => Value::StringValue(s.clone()),
            AttributeValue::Bool(b) => Value::BoolValue(*b),
            AttributeValue::Int(i) => Value::IntValue(*i),
            AttributeValue::Double(d) => Value::DoubleValue(*d),
            AttributeValue::Array(items) => Value::ArrayValue(ArrayValue {
                values: items.iter().map(AttributeValue::to_any_value).collect(),
            }),
            AttributeValue::Map(map) => Value::KvlistValue(KeyValueList {
                values: map
                    .iter()
                    .map(|(k, v)| KeyValue {
                        key: k.clone(),
                        value: Some(v.to_any_value()),
                    })
                    .collect(),
            }),
        };
        AnyValue { value: Some(value) }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Double(d) => write!(f, "{}", d),
            // Complex values render as JSON
            other => match serde_json::to_string(other) {
                Ok(json) => f.write_str(&json),
                Err(_) => f.write_str("null"),
            },
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(value)
    }
}

/// Merge `overlay` into `current`. Keys already present in `current` win.
pub fn merge_current_wins(current: &Attributes, overlay: &Attributes) -> Attributes {
    let mut merged = overlay.clone();
    for (k, v) in current {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

pub fn to_key_values(attributes: &Attributes) -> Vec<KeyValue> {
    let mut keys: Vec<&String> = attributes.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|k| KeyValue {
            key: k.clone(),
            value: Some(attributes[k].to_any_value()),
        })
        .collect()
}
