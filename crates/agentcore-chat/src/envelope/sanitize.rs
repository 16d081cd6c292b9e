//! Operator-facing debug copies of parsed events.
//!
//! Sanitization never fails: values that cannot be represented as JSON are
//! dropped from their container instead of aborting the debug output.

use serde_json::{Map, Number, Value};

/// Loosely typed tree that may carry values JSON cannot represent.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Raw bytes (for example an unread response body).
    Bytes(Vec<u8>),
    List(Vec<DebugValue>),
    Map(Vec<(String, DebugValue)>),
}

impl From<Value> for DebugValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => DebugValue::Null,
            Value::Bool(b) => DebugValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => DebugValue::Int(i),
                None => DebugValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => DebugValue::String(s),
            Value::Array(items) => DebugValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                DebugValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Returns a JSON copy of `value` with every non-representable value removed.
///
/// `None` means the value itself is not representable.
pub fn sanitize(value: &DebugValue) -> Option<Value> {
    match value {
        DebugValue::Null => Some(Value::Null),
        DebugValue::Bool(b) => Some(Value::Bool(*b)),
        DebugValue::Int(i) => Some(Value::Number((*i).into())),
        DebugValue::Float(f) => Number::from_f64(*f).map(Value::Number),
        DebugValue::String(s) => Some(Value::String(s.clone())),
        DebugValue::Bytes(_) => None,
        DebugValue::List(items) => Some(Value::Array(items.iter().filter_map(sanitize).collect())),
        DebugValue::Map(entries) => {
            let mut map = Map::new();
            for (key, item) in entries {
                if let Some(clean) = sanitize(item) {
                    map.insert(key.clone(), clean);
                }
            }
            Some(Value::Object(map))
        }
    }
}

/// What produced a debug record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugKind {
    /// A parsed `data: ` event.
    Event,
    /// The final retained `message` event.
    FinalMessage,
    /// A batched (non-streaming) response body.
    Body,
    /// Response metadata from the transport.
    Response,
}

/// Sanitized copy of one parsed event, shown to the operator only.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DebugRecord {
    pub seq: u64,
    pub kind: DebugKind,
    pub value: Value,
}

impl DebugRecord {
    pub fn new(seq: u64, kind: DebugKind, value: &DebugValue) -> Self {
        Self {
            seq,
            kind,
            value: sanitize(value).unwrap_or(Value::Null),
        }
    }

    /// Pretty JSON for display. Non-ASCII text is kept as is.
    pub fn to_pretty_json(&self) -> String {
        // A sanitized tree contains only JSON values, so this cannot fail.
        serde_json::to_string_pretty(&self.value).unwrap_or_default()
    }
}
