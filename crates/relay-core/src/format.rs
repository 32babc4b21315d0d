//! The two upstream wire conventions the gateway speaks.

use serde::{Deserialize, Serialize};

/// Version header value sent with every messages-style request.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Wire convention used by an inbound request or an upstream provider.
///
/// Format A is the bearer-token chat-completion convention; format B is the
/// api-key/version-header messages convention. A provider may support one or
/// both, learned at boot via capability discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    /// Chat-completion convention (`POST /v1/chat/completions`, bearer auth).
    OpenAi,
    /// Messages convention (`POST /v1/messages`, api-key + version headers).
    Anthropic,
}

impl ApiFormat {
    /// Request path for chat dispatch in this convention.
    #[must_use]
    pub fn chat_path(self) -> &'static str {
        match self {
            Self::OpenAi => "/v1/chat/completions",
            Self::Anthropic => "/v1/messages",
        }
    }

    /// Request path for the model-list probe in this convention.
    ///
    /// Both conventions expose the same path; they differ only in auth
    /// headers.
    #[must_use]
    pub fn models_path(self) -> &'static str {
        "/v1/models"
    }
}

impl std::fmt::Display for ApiFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}
