//! Response-envelope decoding.
//!
//! Agent runtimes stream `data: ` lines whose payload takes one of a handful
//! of JSON shapes (or is not JSON at all). `Envelope::decode` maps a payload
//! onto a closed set of variants so the normalizer can match exhaustively.

pub mod body;
pub mod lines;
pub mod message;
pub mod normalizer;
pub mod sanitize;

use serde_json::Value;

pub use body::{BodyOutcome, extract_body_text};
pub use lines::{DATA_PREFIX, Line, LineDecoder, classify_line};
pub use message::{Decoded, MAX_DECODE_DEPTH, NoAnswer, decode_nested, extract_final_answer};
pub use normalizer::{
    EnvelopeNormalizer, NonDataLines, NormalizedEvent, NormalizerPolicy, Unparseable,
};
pub use sanitize::{DebugKind, DebugRecord, DebugValue, sanitize};

/// One decoded `data: ` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Bare JSON string.
    Text(String),
    /// `{"delta": {"text": ...}}`.
    Delta(String),
    /// `{"event": {"contentBlockDelta": {"delta": {"text": ...}}}}`.
    ContentBlockDelta(String),
    /// `{"message": ...}`; carries the value of the `message` key.
    Message(Value),
    /// `{"outputText": "..."}`.
    OutputText(String),
    /// `{"eventType": "messageStop"}`.
    MessageStop,
    /// Payload that is not JSON, kept verbatim.
    Literal(String),
    /// Valid JSON matching no known shape.
    Unrecognized(Value),
}

impl Envelope {
    /// Decodes a payload. Never fails: non-JSON becomes `Literal`.
    pub fn decode(payload: &str) -> Self {
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => Self::from_value(value),
            Err(_) => Envelope::Literal(payload.to_string()),
        }
    }

    /// Classifies an already-parsed value, first matching shape wins.
    pub fn from_value(value: Value) -> Self {
        let map = match value {
            Value::String(text) => return Envelope::Text(text),
            Value::Object(map) => map,
            other => return Envelope::Unrecognized(other),
        };

        if let Some(Value::Object(delta)) = map.get("delta") {
            return Envelope::Delta(text_field(delta.get("text")));
        }
        if let Some(delta) = map
            .get("event")
            .and_then(|event| event.get("contentBlockDelta"))
            .and_then(|block| block.get("delta"))
        {
            return Envelope::ContentBlockDelta(text_field(delta.get("text")));
        }
        if let Some(message) = map.get("message") {
            return Envelope::Message(message.clone());
        }
        if let Some(Value::String(text)) = map.get("outputText") {
            return Envelope::OutputText(text.clone());
        }
        if map.get("eventType").and_then(Value::as_str) == Some("messageStop") {
            return Envelope::MessageStop;
        }
        Envelope::Unrecognized(Value::Object(map))
    }

    /// Text fragment carried by this envelope, if it is an incremental one.
    pub fn fragment(&self) -> Option<&str> {
        match self {
            Envelope::Text(text)
            | Envelope::Delta(text)
            | Envelope::ContentBlockDelta(text)
            | Envelope::OutputText(text)
            | Envelope::Literal(text) => Some(text),
            Envelope::Message(_) | Envelope::MessageStop | Envelope::Unrecognized(_) => None,
        }
    }
}

fn text_field(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .unwrap_or_default()
}
