//! Custom Axum extractors for the gateway.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{error::ApiError, state::AppState};

/// Extract a request ID from headers or generate one.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

        Ok(Self(id))
    }
}

/// JSON body extractor with bounded read time and structured errors.
///
/// Size is bounded by the router's body-limit layer; this extractor adds
/// the read timeout and turns malformed JSON into a 400 instead of a
/// default rejection.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T> FromRequest<AppState> for JsonBody<T>
where
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let read = axum::body::Bytes::from_request(req, state);
        let bytes = tokio::time::timeout(state.config.body_read_timeout, read)
            .await
            .map_err(|_| ApiError::request_timeout("timed out reading request body"))?
            .map_err(|rejection| {
                ApiError::new(
                    rejection.status(),
                    "invalid_request_body",
                    rejection.body_text(),
                )
            })?;

        let value: T = serde_json::from_slice(&bytes).map_err(|e| {
            debug!(error = %e, "JSON parse error");
            ApiError::bad_request(format!("invalid JSON: {e}"))
        })?;

        Ok(Self(value))
    }
}
