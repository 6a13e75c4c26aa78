//! Tag conversion between map form and the CloudFormation Key/Value list
//!
//! Callers declare tags as a plain `{key: value}` object; AWS represents
//! them as `[{"Key": ..., "Value": ...}]`. Both directions are lossy only
//! for non-string values, which AWS tags cannot carry anyway.

use serde_json::{Value, json};

/// Map form to CloudFormation list form
pub fn to_aws(tags: &Value) -> Value {
    match tags {
        Value::Object(map) => Value::Array(
            map.iter()
                .filter_map(|(key, value)| {
                    value.as_str().map(|v| json!({"Key": key, "Value": v}))
                })
                .collect(),
        ),
        // Already in list form
        other => other.clone(),
    }
}

/// CloudFormation list form to map form
pub fn to_map(tags: &Value) -> Value {
    match tags {
        Value::Array(items) => {
            let mut map = serde_json::Map::new();
            for item in items {
                if let (Some(key), Some(value)) = (
                    item.get("Key").and_then(Value::as_str),
                    item.get("Value").and_then(Value::as_str),
                ) {
                    map.insert(key.to_string(), json!(value));
                }
            }
            Value::Object(map)
        }
        other => other.clone(),
    }
}
