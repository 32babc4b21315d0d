//! Messages wire convention (format B).
//!
//! Request and response models for the `/v1/messages` surface.

use crate::message::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default `max_tokens` applied when translating from a convention that
/// leaves it optional; the messages convention requires it.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Inbound or outbound messages-style request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    /// Public model name or resolved upstream model name.
    pub model: String,
    /// Conversation messages (`user`/`assistant` roles only).
    pub messages: Vec<ChatMessage>,
    /// System prompt, separate from the message list in this convention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<Value>,
    /// Maximum tokens to generate. Required by this convention.
    pub max_tokens: u32,
    /// Request a streamed event sequence.
    #[serde(default)]
    pub stream: bool,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Fields relayed untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One content block in a messages-style response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Block type (`text`, `tool_use`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Text payload for `text` blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Fields relayed untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ContentBlock {
    /// Create a text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.into()),
            extra: serde_json::Map::new(),
        }
    }
}

/// Token accounting block in the messages convention.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnthropicUsage {
    /// Tokens in the prompt.
    pub input_tokens: u32,
    /// Tokens in the completion.
    pub output_tokens: u32,
    /// Fields relayed untouched (cache accounting, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Non-streaming messages-style response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    /// Response identifier.
    pub id: String,
    /// Always `"message"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Always `"assistant"`.
    pub role: String,
    /// Generated content blocks.
    pub content: Vec<ContentBlock>,
    /// Model that produced the response.
    pub model: String,
    /// Why generation stopped (`end_turn`, `max_tokens`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// Which stop sequence fired, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    /// Token accounting.
    pub usage: AnthropicUsage,
    /// Fields relayed untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl MessagesResponse {
    /// Concatenated text of all `text` content blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_parses_with_system_prompt() {
        let req: MessagesRequest = serde_json::from_value(json!({
            "model": "claude-3-haiku",
            "max_tokens": 256,
            "system": "be terse",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .unwrap();
        assert_eq!(req.system, Some(json!("be terse")));
        assert!(!req.stream);
    }

    #[test]
    fn response_text_joins_blocks() {
        let resp: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-haiku",
            "content": [
                {"type": "text", "text": "hello "},
                {"type": "tool_use", "id": "t1", "name": "f", "input": {}},
                {"type": "text", "text": "world"}
            ],
            "usage": {"input_tokens": 3, "output_tokens": 5}
        }))
        .unwrap();
        assert_eq!(resp.text(), "hello world");
    }
}
