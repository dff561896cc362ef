//! Snapshot Model
//!
//! A snapshot is one cumulative view of the pipeline's output: a JSON object
//! of named fields plus an ordered `messages` list. Nested objects (the debate
//! states) expose their members as dotted keys such as
//! `investment_debate_state.judge_decision`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::fields;
use crate::types::{PulseError, Result};

/// One point-in-time view of cumulative pipeline output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    fields: Map<String, Value>,
}

impl Snapshot {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build a snapshot from any JSON value; only objects are accepted
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(PulseError::producer(format!(
                "Snapshot must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Look up a top-level or dotted (`parent.child`) field
    pub fn get(&self, key: &str) -> Option<&Value> {
        match key.split_once('.') {
            Some((parent, child)) => self.fields.get(parent)?.as_object()?.get(child),
            None => self.fields.get(key),
        }
    }

    /// True when the field exists and carries a truthy value
    pub fn is_populated(&self, key: &str) -> bool {
        self.get(key).is_some_and(is_truthy)
    }

    /// Every populated field key other than `messages`, nested members included
    pub fn populated_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for (key, value) in &self.fields {
            if key == fields::MESSAGES {
                continue;
            }
            if is_truthy(value) {
                keys.push(key.clone());
            }
            if let Value::Object(members) = value {
                keys.extend(
                    members
                        .iter()
                        .filter(|(_, v)| is_truthy(v))
                        .map(|(child, _)| format!("{}.{}", key, child)),
                );
            }
        }
        keys
    }

    /// Raw message list, empty when absent or not an array
    pub fn messages(&self) -> &[Value] {
        self.fields
            .get(fields::MESSAGES)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn message_count(&self) -> usize {
        self.messages().len()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// One message emitted by a pipeline agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageUnit {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub tool_calls: u64,
}

impl MessageUnit {
    /// Interpret a raw message value. Never fails: unknown shapes yield an
    /// empty unit with zero tool calls.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => Self {
                content: text.clone(),
                kind: None,
                tool_calls: 0,
            },
            Value::Object(obj) => Self {
                content: obj.get("content").map(content_text).unwrap_or_default(),
                kind: obj
                    .get("type")
                    .or_else(|| obj.get("role"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                tool_calls: obj
                    .get("tool_calls")
                    .and_then(Value::as_array)
                    .map(|calls| calls.len() as u64)
                    .unwrap_or(0),
            },
            _ => Self::default(),
        }
    }
}

/// Flatten message content: plain strings as-is, content-block lists joined by
/// their `text` members.
fn content_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                Value::String(text) => Some(text.as_str()),
                Value::Object(obj) => obj.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Truthiness used for "populated": null, false, zero and empty
/// strings/arrays/objects are not populated.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(members) => !members.is_empty(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
