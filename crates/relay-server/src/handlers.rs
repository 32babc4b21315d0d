//! HTTP request handlers for the gateway API.

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use relay_core::{ChatCompletionRequest, MessagesRequest, ModelObject, ModelsResponse};
use relay_proxy::{InboundRequest, UpstreamReply};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    error::ApiError,
    extractors::{JsonBody, RequestId},
    state::AppState,
    SERVICE_NAME,
};

/// Per-provider entry in the health inventory.
#[derive(Debug, Serialize)]
pub struct ProviderHealth {
    /// Provider id.
    pub name: String,
    /// Discovered model ids.
    pub models: Vec<String>,
    /// Answered the bearer-token probe.
    pub openai: bool,
    /// Answered the api-key/version probe.
    pub anthropic: bool,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Gateway status. Always `ok` once the server is up: the listener
    /// only binds after discovery has completed for every provider.
    pub status: String,
    /// Service identity, matched by the lifecycle manager's port scan.
    pub service: String,
    /// Gateway version.
    pub version: String,
    /// Provider inventory.
    pub providers: Vec<ProviderHealth>,
    /// Configured alias names.
    pub aliases: Vec<String>,
}

/// Health endpoint: gateway status plus provider/alias inventory.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let providers = state
        .registry
        .all()
        .iter()
        .map(|p| ProviderHealth {
            name: p.id().to_string(),
            models: p.models().to_vec(),
            openai: p.capabilities().openai,
            anthropic: p.capabilities().anthropic,
        })
        .collect();

    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers,
        aliases: state
            .table
            .alias_names()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

/// Model-list endpoint: enumerates configured alias names.
#[instrument(skip(state))]
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let data = state
        .table
        .alias_names()
        .into_iter()
        .map(|name| {
            let owned_by = state
                .table
                .resolve(name)
                .ok()
                .and_then(|alias| alias.targets.first().map(|t| t.provider.clone()))
                .unwrap_or_else(|| "relay".to_string());
            ModelObject::new(name, owned_by)
        })
        .collect();

    Json(ModelsResponse::new(data))
}

/// Chat-completion endpoint (format A inbound).
#[instrument(skip(state, body), fields(request_id = %request_id.0, model = %body.model))]
pub async fn chat_completions(
    State(state): State<AppState>,
    request_id: RequestId,
    JsonBody(body): JsonBody<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    debug!(stream = body.stream, "chat completion request");
    let reply = state
        .engine
        .dispatch(&InboundRequest::OpenAi(body))
        .await?;
    reply_response(reply)
}

/// Messages endpoint (format B inbound).
#[instrument(skip(state, body), fields(request_id = %request_id.0, model = %body.model))]
pub async fn messages(
    State(state): State<AppState>,
    request_id: RequestId,
    JsonBody(body): JsonBody<MessagesRequest>,
) -> Result<Response, ApiError> {
    debug!(stream = body.stream, "messages request");
    let reply = state
        .engine
        .dispatch(&InboundRequest::Anthropic(body))
        .await?;
    reply_response(reply)
}

/// Turn an engine reply into an HTTP response. Streamed bodies are piped
/// through unbuffered with event-stream delivery headers.
fn reply_response(reply: UpstreamReply) -> Result<Response, ApiError> {
    match reply {
        UpstreamReply::Json { status, body } => Ok((status, Json(body)).into_response()),
        UpstreamReply::Stream {
            status,
            content_type,
            body,
        } => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from_stream(body))
            .map_err(|e| ApiError::internal(format!("failed to build streaming response: {e}"))),
    }
}
