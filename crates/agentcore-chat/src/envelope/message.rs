//! Final-answer extraction for terminal `message` events.
//!
//! Agent runtimes wrap the final assistant message in varying ways: as an
//! object, as a JSON-encoded string, sometimes as a JSON string that encodes
//! another JSON string, or as plain text. Everything here resolves those
//! shapes to the assistant's text or to a typed reason why there is none.

use serde_json::{Map, Value};

/// Maximum number of string re-parses applied to one value.
pub const MAX_DECODE_DEPTH: usize = 10;

/// Result of repeatedly re-parsing string values that contain JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Decoding reached a JSON object.
    Object(Map<String, Value>),
    /// Decoding reached a string that is not itself JSON.
    Leaf(String),
    /// Decoding reached a number, boolean, null or array.
    Scalar(Value),
    /// The value was still a JSON-encoded string after the depth cap.
    DepthExceeded,
}

/// Why a terminal message did not yield an answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum NoAnswer {
    #[error("message role is {0:?}, expected \"assistant\"")]
    NotAssistant(Option<String>),
    #[error("assistant message has no text content")]
    MissingContent,
    #[error("assistant message text is empty")]
    EmptyText,
    #[error("message decoded to a non-object value")]
    Undecodable,
    #[error("message is nested deeper than {} encodings", MAX_DECODE_DEPTH)]
    DepthExceeded,
}

/// Re-parses JSON-encoded strings until a non-string value is reached, the
/// string stops parsing, or `max_depth` parses have been applied.
pub fn decode_nested(value: Value, max_depth: usize) -> Decoded {
    let mut current = value;
    for _ in 0..=max_depth {
        match current {
            Value::Object(map) => return Decoded::Object(map),
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(parsed) => current = parsed,
                Err(_) => return Decoded::Leaf(text),
            },
            other => return Decoded::Scalar(other),
        }
    }
    Decoded::DepthExceeded
}

/// Extracts the assistant answer from the value of a `message` key.
pub fn extract_final_answer(message: &Value) -> Result<String, NoAnswer> {
    let object = match decode_nested(message.clone(), MAX_DECODE_DEPTH) {
        Decoded::Object(map) => map,
        Decoded::Leaf(text) => wrap_plain_text(text),
        Decoded::Scalar(_) => return Err(NoAnswer::Undecodable),
        Decoded::DepthExceeded => return Err(NoAnswer::DepthExceeded),
    };

    let role = object.get("role").and_then(Value::as_str);
    if role != Some("assistant") {
        return Err(NoAnswer::NotAssistant(role.map(ToOwned::to_owned)));
    }

    let text = match object.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(blocks)) => {
            let texts: Vec<&str> = blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect();
            if texts.is_empty() {
                return Err(NoAnswer::MissingContent);
            }
            texts.join("\n")
        }
        _ => return Err(NoAnswer::MissingContent),
    };

    if text.trim().is_empty() {
        return Err(NoAnswer::EmptyText);
    }
    Ok(text)
}

// Plain text is the answer itself.
fn wrap_plain_text(text: String) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("role".into(), Value::String("assistant".into()));
    map.insert("content".into(), serde_json::json!([{ "text": text }]));
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_encoded_string_message_is_decoded() {
        let message = json!("{\"role\":\"assistant\",\"content\":[{\"text\":\"hi\"}]}");
        assert_eq!(extract_final_answer(&message), Ok("hi".into()));
    }

    #[test]
    fn plain_string_message_is_wrapped_then_unwrapped() {
        assert_eq!(extract_final_answer(&json!("hello")), Ok("hello".into()));
    }

    #[test]
    fn doubly_encoded_message_is_decoded() {
        let inner = json!({"role":"assistant","content":[{"text":"deep"}]}).to_string();
        let outer = serde_json::to_string(&inner).expect("encode");
        assert_eq!(extract_final_answer(&json!(outer)), Ok("deep".into()));
    }

    #[test]
    fn object_message_joins_text_blocks_and_skips_others() {
        let message = json!({
            "role": "assistant",
            "content": [
                {"text": "first"},
                {"toolUse": {"name": "search"}},
                {"text": "second"}
            ]
        });
        assert_eq!(extract_final_answer(&message), Ok("first\nsecond".into()));
    }

    #[test]
    fn bare_string_content_is_used_directly() {
        let message = json!({"role": "assistant", "content": "direct"});
        assert_eq!(extract_final_answer(&message), Ok("direct".into()));
    }

    #[test]
    fn non_assistant_role_is_rejected() {
        let message = json!({"role": "user", "content": [{"text": "question"}]});
        assert_eq!(
            extract_final_answer(&message),
            Err(NoAnswer::NotAssistant(Some("user".into())))
        );
        let missing = json!({"content": [{"text": "x"}]});
        assert_eq!(
            extract_final_answer(&missing),
            Err(NoAnswer::NotAssistant(None))
        );
    }

    #[test]
    fn whitespace_only_answer_is_empty_not_missing() {
        let empty = json!({"role": "assistant", "content": [{"text": "  \n"}]});
        assert_eq!(extract_final_answer(&empty), Err(NoAnswer::EmptyText));
        let no_blocks = json!({"role": "assistant", "content": []});
        assert_eq!(extract_final_answer(&no_blocks), Err(NoAnswer::MissingContent));
    }

    #[test]
    fn scalar_message_is_undecodable() {
        assert_eq!(extract_final_answer(&json!("42")), Err(NoAnswer::Undecodable));
        assert_eq!(extract_final_answer(&json!([1, 2])), Err(NoAnswer::Undecodable));
    }

    #[test]
    fn decode_stops_at_depth_cap() {
        let mut value = json!({"role": "assistant", "content": "x"}).to_string();
        for _ in 0..MAX_DECODE_DEPTH + 1 {
            value = serde_json::to_string(&value).expect("encode");
        }
        assert_eq!(
            decode_nested(Value::String(value.clone()), MAX_DECODE_DEPTH),
            Decoded::DepthExceeded
        );
        assert_eq!(
            extract_final_answer(&Value::String(value)),
            Err(NoAnswer::DepthExceeded)
        );
    }

    #[test]
    fn decode_distinguishes_leaf_from_object() {
        assert_eq!(
            decode_nested(json!("not json"), MAX_DECODE_DEPTH),
            Decoded::Leaf("not json".into())
        );
        assert!(matches!(
            decode_nested(json!("{\"a\":1}"), MAX_DECODE_DEPTH),
            Decoded::Object(map) if map.get("a") == Some(&json!(1))
        ));
    }
}
