//! Dispatch with sequential fallback and streaming passthrough.
//!
//! Fallback iteration is strictly sequential per request: a failed
//! primary's latency is paid in full before a fallback is attempted. This
//! is a deliberate latency/cost trade-off over speculative racing.

use crate::translate;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use http::StatusCode;
use relay_core::{
    ApiFormat, ChatCompletionRequest, ChatCompletionResponse, FailureClass, MessagesRequest,
    MessagesResponse, RelayError, RelayResult, TargetFailure, ANTHROPIC_VERSION,
};
use relay_providers::{Provider, ProviderRegistry};
use relay_routing::RoutingTable;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// An inbound request in whichever convention the caller used.
#[derive(Debug, Clone)]
pub enum InboundRequest {
    /// Arrived on the chat-completion surface.
    OpenAi(ChatCompletionRequest),
    /// Arrived on the messages surface.
    Anthropic(MessagesRequest),
}

impl InboundRequest {
    /// Convention the caller used.
    #[must_use]
    pub fn format(&self) -> ApiFormat {
        match self {
            Self::OpenAi(_) => ApiFormat::OpenAi,
            Self::Anthropic(_) => ApiFormat::Anthropic,
        }
    }

    /// Public model name (an alias at the gateway surface).
    #[must_use]
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAi(req) => &req.model,
            Self::Anthropic(req) => &req.model,
        }
    }

    /// Whether the caller requested a streamed response.
    #[must_use]
    pub fn stream(&self) -> bool {
        match self {
            Self::OpenAi(req) => req.stream,
            Self::Anthropic(req) => req.stream,
        }
    }
}

/// What the engine hands back to the HTTP layer.
pub enum UpstreamReply {
    /// A complete JSON body to relay with the given status.
    Json {
        /// Status to relay.
        status: StatusCode,
        /// Body to relay.
        body: Value,
    },
    /// An upstream body piped through byte-for-byte, unbuffered.
    Stream {
        /// Status to relay.
        status: StatusCode,
        /// Upstream content type (defaults to `text/event-stream`).
        content_type: String,
        /// The upstream byte stream.
        body: BoxStream<'static, Result<Bytes, std::io::Error>>,
    },
}

impl std::fmt::Debug for UpstreamReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json { status, body } => f
                .debug_struct("Json")
                .field("status", status)
                .field("body", body)
                .finish(),
            Self::Stream {
                status,
                content_type,
                ..
            } => f
                .debug_struct("Stream")
                .field("status", status)
                .field("content_type", content_type)
                .finish_non_exhaustive(),
        }
    }
}

/// Outcome of one target attempt.
enum Attempt {
    /// Relay immediately: success or a non-qualifying upstream error.
    Relay(UpstreamReply),
    /// Qualifying upstream failure with a relayable body, in case the
    /// alias's policy does not cover this class.
    Failed {
        class: FailureClass,
        reason: String,
        reply: UpstreamReply,
    },
    /// Transport-level failure; nothing relayable.
    Transport { class: FailureClass, reason: String },
}

/// The routing/fallback proxy engine.
///
/// Owns no global state: registry and table are explicit so several
/// gateways can coexist in one process.
#[derive(Debug, Clone)]
pub struct ProxyEngine {
    client: reqwest::Client,
    registry: Arc<ProviderRegistry>,
    table: Arc<RoutingTable>,
    upstream_timeout: Duration,
}

impl ProxyEngine {
    /// Create an engine over a shared connection pool and the frozen
    /// post-discovery tables.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        registry: Arc<ProviderRegistry>,
        table: Arc<RoutingTable>,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            client,
            registry,
            table,
            upstream_timeout,
        }
    }

    /// Resolve the alias and walk its targets in declared order.
    ///
    /// # Errors
    /// Routing error for unknown aliases; aggregate failure when every
    /// target is exhausted without a relay.
    pub async fn dispatch(&self, inbound: &InboundRequest) -> RelayResult<UpstreamReply> {
        let alias = self.table.resolve(inbound.model())?;
        let mut attempts: Vec<TargetFailure> = Vec::new();

        for target in &alias.targets {
            let Some(provider) = self.registry.get(&target.provider) else {
                debug!(alias = %alias.name, provider = %target.provider, "target provider not registered");
                attempts.push(TargetFailure::new(
                    &target.provider,
                    &target.model,
                    "provider not registered",
                ));
                continue;
            };
            let Some(format) = provider.dispatch_format(inbound.format()) else {
                attempts.push(TargetFailure::new(
                    &target.provider,
                    &target.model,
                    "provider answered no discovery probe, excluded from routing",
                ));
                continue;
            };
            if !provider.serves_model(&target.model) {
                attempts.push(TargetFailure::new(
                    &target.provider,
                    &target.model,
                    format!("model '{}' not in provider's discovered model list", target.model),
                ));
                continue;
            }

            match self.attempt(&provider, format, &target.model, inbound).await {
                Attempt::Relay(reply) => return Ok(reply),
                Attempt::Failed {
                    class,
                    reason,
                    reply,
                } => {
                    if alias.fallback_on.allows(class) {
                        warn!(
                            alias = %alias.name,
                            provider = %target.provider,
                            class = %class,
                            reason = %reason,
                            "target failed, advancing to next target"
                        );
                        attempts.push(TargetFailure::new(&target.provider, &target.model, reason));
                    } else {
                        // Qualifying class, but the alias does not fall
                        // back on it: relay the upstream answer verbatim.
                        return Ok(reply);
                    }
                }
                Attempt::Transport { class, reason } => {
                    if alias.fallback_on.allows(class) {
                        warn!(
                            alias = %alias.name,
                            provider = %target.provider,
                            class = %class,
                            reason = %reason,
                            "target unreachable, advancing to next target"
                        );
                        attempts.push(TargetFailure::new(&target.provider, &target.model, reason));
                    } else {
                        let status = if class == FailureClass::Timeout { 504 } else { 502 };
                        return Err(RelayError::upstream(&target.provider, status, reason));
                    }
                }
            }
        }

        Err(RelayError::AllTargetsFailed {
            alias: alias.name.clone(),
            attempts,
        })
    }

    async fn attempt(
        &self,
        provider: &Provider,
        format: ApiFormat,
        upstream_model: &str,
        inbound: &InboundRequest,
    ) -> Attempt {
        let body = outbound_body(inbound, format, upstream_model);
        let url = provider.endpoint(format.chat_path());
        let key = provider.next_credential();

        let mut request = self.client.post(&url).json(&body);
        request = match format {
            ApiFormat::OpenAi => request.bearer_auth(key.expose_secret()),
            ApiFormat::Anthropic => request
                .header("x-api-key", key.expose_secret().as_str())
                .header("anthropic-version", ANTHROPIC_VERSION),
        };

        // A total timeout on a streaming call would sever long streams, so
        // those only bound time-to-headers.
        let send = if inbound.stream() {
            match tokio::time::timeout(self.upstream_timeout, request.send()).await {
                Ok(result) => result,
                Err(_) => {
                    return Attempt::Transport {
                        class: FailureClass::Timeout,
                        reason: format!(
                            "no response headers within {:?}",
                            self.upstream_timeout
                        ),
                    }
                }
            }
        } else {
            request.timeout(self.upstream_timeout).send().await
        };

        let resp = match send {
            Ok(resp) => resp,
            Err(e) => {
                return Attempt::Transport {
                    class: classify_transport(&e),
                    reason: format!("transport error: {e}"),
                }
            }
        };

        let status = resp.status();
        if let Some(class) = FailureClass::from_status(status.as_u16()) {
            let text = resp.text().await.unwrap_or_default();
            let reason = if text.is_empty() {
                format!("upstream status {status}")
            } else {
                format!("upstream status {status}: {}", snippet(&text))
            };
            let body = serde_json::from_str(&text)
                .unwrap_or_else(|_| serde_json::json!({ "error": { "message": text } }));
            return Attempt::Failed {
                class,
                reason,
                reply: UpstreamReply::Json { status, body },
            };
        }

        let content_type = resp
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if inbound.stream() || content_type.starts_with(mime::TEXT_EVENT_STREAM.as_ref()) {
            let content_type = if content_type.is_empty() {
                mime::TEXT_EVENT_STREAM.to_string()
            } else {
                content_type
            };
            let stream = resp.bytes_stream().map_err(std::io::Error::other).boxed();
            return Attempt::Relay(UpstreamReply::Stream {
                status,
                content_type,
                body: stream,
            });
        }

        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Attempt::Transport {
                    class: classify_transport(&e),
                    reason: format!("error reading upstream body: {e}"),
                }
            }
        };
        let value: Value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(_) => {
                // Not JSON; relay what we got rather than failing the call.
                return Attempt::Relay(UpstreamReply::Json {
                    status,
                    body: Value::String(String::from_utf8_lossy(&bytes).into_owned()),
                });
            }
        };

        let body = if status.is_success() && format != inbound.format() {
            translate_response(value, format, inbound.format())
        } else {
            value
        };
        Attempt::Relay(UpstreamReply::Json { status, body })
    }
}

/// Build the outbound body in the provider's format with the target's
/// upstream model name substituted.
fn outbound_body(inbound: &InboundRequest, format: ApiFormat, model: &str) -> Value {
    match (inbound, format) {
        (InboundRequest::OpenAi(req), ApiFormat::OpenAi) => {
            let mut out = req.clone();
            out.model = model.to_string();
            serde_json::to_value(out).unwrap_or_default()
        }
        (InboundRequest::OpenAi(req), ApiFormat::Anthropic) => {
            let mut out = translate::openai_to_anthropic(req);
            out.model = model.to_string();
            serde_json::to_value(out).unwrap_or_default()
        }
        (InboundRequest::Anthropic(req), ApiFormat::Anthropic) => {
            let mut out = req.clone();
            out.model = model.to_string();
            serde_json::to_value(out).unwrap_or_default()
        }
        (InboundRequest::Anthropic(req), ApiFormat::OpenAi) => {
            let mut out = translate::anthropic_to_openai(req);
            out.model = model.to_string();
            serde_json::to_value(out).unwrap_or_default()
        }
    }
}

/// Translate a successful upstream body back to the caller's convention.
/// Bodies that do not parse as the expected shape are relayed verbatim.
fn translate_response(value: Value, produced: ApiFormat, wanted: ApiFormat) -> Value {
    match (produced, wanted) {
        (ApiFormat::Anthropic, ApiFormat::OpenAi) => {
            match serde_json::from_value::<MessagesResponse>(value.clone()) {
                Ok(resp) => serde_json::to_value(translate::anthropic_response_to_openai(&resp))
                    .unwrap_or(value),
                Err(_) => value,
            }
        }
        (ApiFormat::OpenAi, ApiFormat::Anthropic) => {
            match serde_json::from_value::<ChatCompletionResponse>(value.clone()) {
                Ok(resp) => serde_json::to_value(translate::openai_response_to_anthropic(&resp))
                    .unwrap_or(value),
                Err(_) => value,
            }
        }
        _ => value,
    }
}

fn classify_transport(e: &reqwest::Error) -> FailureClass {
    if e.is_timeout() {
        FailureClass::Timeout
    } else {
        FailureClass::ServerError
    }
}

/// Bounded excerpt of an upstream error body for failure reasons.
fn snippet(text: &str) -> String {
    const MAX: usize = 200;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{head}...")
    }
}
