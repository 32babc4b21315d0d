//! Chat message shared by both wire conventions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single chat message.
///
/// The role is kept as a plain string and the content as raw JSON so the
/// gateway relays fields it does not interpret (content parts, tool blocks)
/// without loss. Only the pieces translation needs are inspected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role (`system`, `user`, `assistant`, ...).
    pub role: String,
    /// Message content: a string or an array of content parts.
    pub content: Value,
    /// Fields relayed untouched (names, tool calls, cache hints, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ChatMessage {
    /// Create a plain text message.
    pub fn text(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Value::String(content.into()),
            extra: serde_json::Map::new(),
        }
    }

    /// Flatten the content to plain text.
    ///
    /// Strings pass through; arrays of content parts contribute their `text`
    /// fields joined with newlines. Anything else yields an empty string.
    #[must_use]
    pub fn content_text(&self) -> String {
        content_to_text(&self.content)
    }
}

/// Flatten a content value (string or part array) to plain text.
#[must_use]
pub fn content_to_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_content_passes_through() {
        let msg = ChatMessage::text("user", "hello");
        assert_eq!(msg.content_text(), "hello");
    }

    #[test]
    fn part_array_content_is_flattened() {
        let msg: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "first"},
                {"type": "image_url", "image_url": {"url": "http://x/y.png"}},
                {"type": "text", "text": "second"}
            ]
        }))
        .unwrap();
        assert_eq!(msg.content_text(), "first\nsecond");
    }

    #[test]
    fn unknown_fields_round_trip() {
        let input = json!({"role": "assistant", "content": "hi", "name": "bot"});
        let msg: ChatMessage = serde_json::from_value(input.clone()).unwrap();
        let output = serde_json::to_value(&msg).unwrap();
        assert_eq!(output, input);
    }
}
