//! Chat-completion wire convention (format A).
//!
//! Request and response models for the `/v1/chat/completions` surface.
//! Unknown fields are captured in `extra` maps and relayed untouched, so
//! provider-specific parameters survive the trip through the gateway.

use crate::message::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound or outbound chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Public model name (an alias at the gateway surface, an upstream model
    /// name once resolved).
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Request a streamed event sequence instead of a single object.
    #[serde(default)]
    pub stream: bool,
    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Fields relayed untouched (top_p, stop, tools, seed, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Choice index.
    pub index: u32,
    /// Generated assistant message.
    pub message: ChatMessage,
    /// Why generation stopped (`stop`, `length`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    /// Fields relayed untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Token accounting block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens in the completion.
    pub completion_tokens: u32,
    /// Sum of prompt and completion tokens.
    pub total_tokens: u32,
}

/// Non-streaming chat-completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// Response identifier.
    pub id: String,
    /// Always `"chat.completion"`.
    pub object: String,
    /// Unix timestamp of creation.
    pub created: i64,
    /// Model that produced the response.
    pub model: String,
    /// Completion choices.
    pub choices: Vec<ChatChoice>,
    /// Token accounting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Fields relayed untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Entry in the model-list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelObject {
    /// Model identifier (a configured alias name at the gateway surface).
    pub id: String,
    /// Always `"model"`.
    pub object: String,
    /// Owner shown to clients; the gateway reports the primary target's
    /// provider id.
    pub owned_by: String,
}

impl ModelObject {
    /// Create a model-list entry.
    pub fn new(id: impl Into<String>, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "model".to_string(),
            owned_by: owned_by.into(),
        }
    }
}

/// Model-list response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Always `"list"`.
    pub object: String,
    /// Listed models.
    pub data: Vec<ModelObject>,
}

impl ModelsResponse {
    /// Wrap model entries in the list envelope.
    #[must_use]
    pub fn new(data: Vec<ModelObject>) -> Self {
        Self {
            object: "list".to_string(),
            data,
        }
    }
}
