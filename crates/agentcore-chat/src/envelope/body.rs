use serde_json::Value;

use super::message::{Decoded, MAX_DECODE_DEPTH, decode_nested};
use crate::errors::FramingError;

/// Answer carried by a batched (non-streaming) response body.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyOutcome {
    /// Plain answer text (`completion`, `outputText`, bare string or non-JSON body).
    Text(String),
    /// The body carried a final `message`; holds the value of that key.
    Message(Value),
    /// Blank body or a JSON shape with no answer field.
    Empty,
}

/// Extracts the answer from a complete response body.
///
/// Accepted shapes: `{completion}`, `{outputText}`, `{message}`, `{body: ...}`
/// where `body` is an object or a JSON-encoded string wrapping one of the
/// others, a bare JSON string, or non-JSON text taken verbatim.
pub fn extract_body_text(body: &[u8]) -> Result<BodyOutcome, FramingError> {
    let text = std::str::from_utf8(body).map_err(|e| FramingError::InvalidUtf8 {
        line: 1,
        message: e.to_string(),
    })?;
    if text.trim().is_empty() {
        return Ok(BodyOutcome::Empty);
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(from_value(value)),
        Err(_) => Ok(BodyOutcome::Text(text.to_string())),
    }
}

fn from_value(value: Value) -> BodyOutcome {
    let mut current = value;
    for _ in 0..MAX_DECODE_DEPTH {
        let map = match decode_nested(current, MAX_DECODE_DEPTH) {
            Decoded::Object(map) => map,
            Decoded::Leaf(text) => return BodyOutcome::Text(text),
            Decoded::Scalar(_) | Decoded::DepthExceeded => return BodyOutcome::Empty,
        };
        if let Some(Value::String(text)) = map.get("completion") {
            return BodyOutcome::Text(text.clone());
        }
        if let Some(Value::String(text)) = map.get("outputText") {
            return BodyOutcome::Text(text.clone());
        }
        if let Some(message) = map.get("message") {
            return BodyOutcome::Message(message.clone());
        }
        match map.get("body") {
            Some(inner) => current = inner.clone(),
            None => return BodyOutcome::Empty,
        }
    }
    BodyOutcome::Empty
}
