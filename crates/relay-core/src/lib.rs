//! # Relay Core
//!
//! Core types, wire formats, and error handling for the LLM relay gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - The two supported wire conventions (chat-completion and messages style)
//! - Error taxonomy shared across config, discovery, routing, and proxying
//! - Common message and model-listing types

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod anthropic;
pub mod error;
pub mod format;
pub mod message;
pub mod openai;

// Re-export commonly used types
pub use anthropic::{AnthropicUsage, ContentBlock, MessagesRequest, MessagesResponse};
pub use error::{FailureClass, RelayError, RelayResult, TargetFailure};
pub use format::{ApiFormat, ANTHROPIC_VERSION};
pub use message::ChatMessage;
pub use openai::{
    ChatChoice, ChatCompletionRequest, ChatCompletionResponse, ModelObject, ModelsResponse, Usage,
};
