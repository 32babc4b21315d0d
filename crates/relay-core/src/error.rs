//! Error types for the relay gateway.
//!
//! The taxonomy follows how failures are recovered: configuration and
//! discovery errors are recovered locally (skip, continue), routing and
//! upstream errors are surfaced to the HTTP caller as structured JSON, and
//! aggregate failures carry one reason per attempted target.

use serde::Serialize;
use thiserror::Error;

/// Result alias using [`RelayError`].
pub type RelayResult<T> = Result<T, RelayError>;

/// One failed dispatch attempt against a routing target.
///
/// Collected during fallback iteration and returned verbatim in the
/// aggregate 502 body so callers can see why every target was rejected.
#[derive(Debug, Clone, Serialize)]
pub struct TargetFailure {
    /// Provider id of the attempted target.
    pub provider: String,
    /// Upstream model name of the attempted target.
    pub model: String,
    /// Human-readable reason the target was skipped or failed.
    pub reason: String,
}

impl TargetFailure {
    /// Create a new target failure record.
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            reason: reason.into(),
        }
    }
}

/// Unified error type for the relay gateway.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed or incomplete provider/alias entry. Logged and skipped at
    /// load time; never fatal to boot.
    #[error("configuration error: {message}")]
    Configuration {
        /// What was wrong with the entry.
        message: String,
    },

    /// A capability probe timed out or returned a non-success response.
    /// The provider stays registered with its capability flags false.
    #[error("discovery failed for provider '{provider}': {message}")]
    Discovery {
        /// Provider that failed the probe.
        provider: String,
        /// Probe failure detail.
        message: String,
    },

    /// Unknown alias or no resolvable target. No upstream call is made.
    #[error("routing error: {message}")]
    Routing {
        /// Resolution failure detail.
        message: String,
    },

    /// An upstream provider answered with an error that does not qualify
    /// for fallback, or the error is being relayed verbatim.
    #[error("upstream '{provider}' returned {status}: {message}")]
    Upstream {
        /// Provider that produced the response.
        provider: String,
        /// Upstream HTTP status code.
        status: u16,
        /// Upstream error detail.
        message: String,
    },

    /// Every target for the alias was exhausted without a relay.
    #[error("all {count} targets failed for alias '{alias}'", count = .attempts.len())]
    AllTargetsFailed {
        /// The alias that was dispatched.
        alias: String,
        /// One reason per attempted target, in declared order.
        attempts: Vec<TargetFailure>,
    },

    /// Unexpected internal failure.
    #[error("internal error: {message}")]
    Internal {
        /// Failure detail.
        message: String,
    },
}

impl RelayError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a discovery error for a provider.
    pub fn discovery(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Discovery {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a routing error.
    pub fn routing(message: impl Into<String>) -> Self {
        Self::Routing {
            message: message.into(),
        }
    }

    /// Create an upstream error.
    pub fn upstream(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status code this error maps to at the gateway surface.
    #[must_use]
    pub fn http_status(&self) -> http::StatusCode {
        match self {
            Self::Routing { .. } => http::StatusCode::NOT_FOUND,
            Self::Upstream { status, .. } => {
                http::StatusCode::from_u16(*status).unwrap_or(http::StatusCode::BAD_GATEWAY)
            }
            Self::AllTargetsFailed { .. } => http::StatusCode::BAD_GATEWAY,
            Self::Configuration { .. } | Self::Discovery { .. } | Self::Internal { .. } => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable error code for JSON error bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Discovery { .. } => "discovery_error",
            Self::Routing { .. } => "routing_error",
            Self::Upstream { .. } => "upstream_error",
            Self::AllTargetsFailed { .. } => "all_targets_failed",
            Self::Internal { .. } => "internal_error",
        }
    }
}

/// Class of upstream failure that can justify advancing to the next
/// fallback target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Upstream answered with a server error (5xx).
    ServerError,
    /// The upstream call timed out or the transport failed.
    Timeout,
    /// Upstream answered 429.
    RateLimited,
}

impl FailureClass {
    /// Classify an upstream HTTP status code. Returns `None` for statuses
    /// that never qualify for fallback (success, client errors).
    #[must_use]
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            429 => Some(Self::RateLimited),
            500..=599 => Some(Self::ServerError),
            _ => None,
        }
    }

    /// Parse a configuration token (`5xx`, `timeout`, `429`).
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "5xx" | "server_error" => Some(Self::ServerError),
            "timeout" => Some(Self::Timeout),
            "429" | "rate_limit" | "rate-limit" => Some(Self::RateLimited),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServerError => write!(f, "5xx"),
            Self::Timeout => write!(f, "timeout"),
            Self::RateLimited => write!(f, "429"),
        }
    }
}
