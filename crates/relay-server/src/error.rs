//! API and server error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_core::RelayError;
use serde_json::{json, Value};
use thiserror::Error;

/// Structured JSON error returned to HTTP callers.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status to respond with.
    pub status: StatusCode,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail (e.g. per-target failure reasons).
    pub detail: Option<Value>,
}

impl ApiError {
    /// Create an error with an explicit status.
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            detail: None,
        }
    }

    /// 400 with a structured body.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    /// 408 for a request body that took too long to arrive.
    pub fn request_timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT, "request_timeout", message)
    }

    /// 500 with a structured body.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    /// Attach structured detail.
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        let status = err.http_status();
        let code = err.code().to_string();
        match err {
            RelayError::AllTargetsFailed { alias, attempts } => Self {
                status,
                code,
                message: format!(
                    "all {} targets failed for alias '{alias}'",
                    attempts.len()
                ),
                detail: serde_json::to_value(&attempts).ok(),
            },
            other => Self {
                status,
                code,
                message: other.to_string(),
                detail: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "message": self.message,
            "type": self.code,
        });
        if let Some(detail) = self.detail {
            error["detail"] = detail;
        }
        (self.status, Json(json!({ "error": error }))).into_response()
    }
}

/// Fatal server-level failures: bind errors and port exhaustion.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding failed for a reason other than address-in-use.
    #[error("failed to bind {host}:{port}: {source}")]
    Bind {
        /// Host the bind was attempted on.
        host: String,
        /// Port the bind was attempted on.
        port: u16,
        /// Underlying bind fault.
        #[source]
        source: std::io::Error,
    },

    /// Every port in the retry window was in use.
    #[error("no free port in range {start}..={end}")]
    NoFreePort {
        /// First port tried.
        start: u16,
        /// Last port tried.
        end: u16,
    },

    /// I/O failure while serving.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_failure_carries_per_target_detail() {
        let err = RelayError::AllTargetsFailed {
            alias: "fast".to_string(),
            attempts: vec![relay_core::TargetFailure::new("p1", "m1", "upstream status 500")],
        };
        let api: ApiError = err.into();
        assert_eq!(api.status, StatusCode::BAD_GATEWAY);
        let detail = api.detail.expect("detail present");
        assert_eq!(detail.as_array().map(Vec::len), Some(1));
        assert_eq!(detail[0]["provider"], "p1");
    }

    #[test]
    fn routing_error_becomes_404() {
        let api: ApiError = RelayError::routing("unknown model alias 'x'").into();
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert_eq!(api.code, "routing_error");
    }
}
