//! Fallback-policy behavior of the proxy engine against mock upstreams.

use relay_config::{AliasConfig, ProviderConfig, TargetConfig};
use relay_core::{FailureClass, RelayError};
use relay_providers::{Capabilities, Provider, ProviderRegistry};
use relay_proxy::{InboundRequest, ProxyEngine, UpstreamReply};
use relay_routing::RoutingTable;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openai_provider(id: &str, url: &str, keys: &[&str]) -> Provider {
    provider_with_caps(
        id,
        url,
        keys,
        Capabilities {
            openai: true,
            anthropic: false,
        },
        &[],
    )
}

fn provider_with_caps(
    id: &str,
    url: &str,
    keys: &[&str],
    caps: Capabilities,
    models: &[&str],
) -> Provider {
    let config = ProviderConfig::new(
        id,
        url,
        keys.iter().map(|k| (*k).to_string()).collect(),
    )
    .unwrap();
    let mut provider = Provider::new(config);
    provider.set_discovered(caps, models.iter().map(|m| (*m).to_string()).collect());
    provider
}

fn engine(providers: Vec<Provider>, aliases: Vec<AliasConfig>) -> ProxyEngine {
    let registry = Arc::new(ProviderRegistry::new(providers));
    let table = Arc::new(RoutingTable::build(aliases, &registry));
    ProxyEngine::new(
        reqwest::Client::new(),
        registry,
        table,
        Duration::from_secs(5),
    )
}

fn chat_inbound(model: &str) -> InboundRequest {
    InboundRequest::OpenAi(
        serde_json::from_value(json!({
            "model": model,
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .unwrap(),
    )
}

fn completion_body(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "object": "chat.completion",
        "created": 1,
        "model": "m",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "ok"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
    })
}

#[tokio::test]
async fn unknown_alias_makes_no_upstream_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine(
        vec![openai_provider("p1", &server.uri(), &["k"])],
        vec![AliasConfig::new(
            "known",
            vec![TargetConfig::new("p1", "m")],
        )],
    );

    let err = engine.dispatch(&chat_inbound("ghost")).await.unwrap_err();
    assert!(matches!(err, RelayError::Routing { .. }));
    server.verify().await;
}

#[tokio::test]
async fn server_error_advances_to_fallback_target() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&primary)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("from-fallback")))
        .expect(1)
        .mount(&fallback)
        .await;

    let engine = engine(
        vec![
            openai_provider("p1", &primary.uri(), &["k1"]),
            openai_provider("p2", &fallback.uri(), &["k2"]),
        ],
        vec![AliasConfig::new(
            "fast",
            vec![TargetConfig::new("p1", "m"), TargetConfig::new("p2", "m")],
        )
        .with_fallback_on(vec![FailureClass::ServerError])],
    );

    let reply = engine.dispatch(&chat_inbound("fast")).await.unwrap();
    match reply {
        UpstreamReply::Json { status, body } => {
            assert_eq!(status.as_u16(), 200);
            assert_eq!(body["id"], "from-fallback");
        }
        UpstreamReply::Stream { .. } => panic!("expected a JSON reply"),
    }
    primary.verify().await;
    fallback.verify().await;
}

#[tokio::test]
async fn client_error_is_relayed_and_stops_iteration() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": {"message": "bad request body"}})),
        )
        .expect(1)
        .mount(&primary)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fallback)
        .await;

    let engine = engine(
        vec![
            openai_provider("p1", &primary.uri(), &["k1"]),
            openai_provider("p2", &fallback.uri(), &["k2"]),
        ],
        vec![AliasConfig::new(
            "fast",
            vec![TargetConfig::new("p1", "m"), TargetConfig::new("p2", "m")],
        )],
    );

    let reply = engine.dispatch(&chat_inbound("fast")).await.unwrap();
    match reply {
        UpstreamReply::Json { status, body } => {
            assert_eq!(status.as_u16(), 400);
            assert_eq!(body["error"]["message"], "bad request body");
        }
        UpstreamReply::Stream { .. } => panic!("expected a JSON reply"),
    }
    primary.verify().await;
    fallback.verify().await;
}

#[tokio::test]
async fn qualifying_failure_outside_policy_is_relayed() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&primary)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fallback)
        .await;

    // Policy only covers 5xx, so the 429 must be relayed verbatim.
    let engine = engine(
        vec![
            openai_provider("p1", &primary.uri(), &["k1"]),
            openai_provider("p2", &fallback.uri(), &["k2"]),
        ],
        vec![AliasConfig::new(
            "fast",
            vec![TargetConfig::new("p1", "m"), TargetConfig::new("p2", "m")],
        )
        .with_fallback_on(vec![FailureClass::ServerError])],
    );

    let reply = engine.dispatch(&chat_inbound("fast")).await.unwrap();
    match reply {
        UpstreamReply::Json { status, .. } => assert_eq!(status.as_u16(), 429),
        UpstreamReply::Stream { .. } => panic!("expected a JSON reply"),
    }
    fallback.verify().await;
}

#[tokio::test]
async fn exhausted_targets_aggregate_one_reason_each() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&primary)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&fallback)
        .await;

    let engine = engine(
        vec![
            openai_provider("p1", &primary.uri(), &["k1"]),
            openai_provider("p2", &fallback.uri(), &["k2"]),
        ],
        vec![AliasConfig::new(
            "fast",
            vec![TargetConfig::new("p1", "m"), TargetConfig::new("p2", "m")],
        )],
    );

    let err = engine.dispatch(&chat_inbound("fast")).await.unwrap_err();
    match err {
        RelayError::AllTargetsFailed { alias, attempts } => {
            assert_eq!(alias, "fast");
            assert_eq!(attempts.len(), 2);
            assert_eq!(attempts[0].provider, "p1");
            assert!(attempts[0].reason.contains("500"));
            assert_eq!(attempts[1].provider, "p2");
            assert!(attempts[1].reason.contains("503"));
        }
        other => panic!("expected aggregate failure, got {other:?}"),
    }
}

#[tokio::test]
async fn unregistered_target_is_skipped_without_network_call() {
    let fallback = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .expect(1)
        .mount(&fallback)
        .await;

    let engine = engine(
        vec![openai_provider("p2", &fallback.uri(), &["k"])],
        vec![AliasConfig::new(
            "fast",
            vec![
                TargetConfig::new("missing", "m"),
                TargetConfig::new("p2", "m"),
            ],
        )],
    );

    let reply = engine.dispatch(&chat_inbound("fast")).await.unwrap();
    assert!(matches!(reply, UpstreamReply::Json { status, .. } if status.as_u16() == 200));
    fallback.verify().await;
}

#[tokio::test]
async fn model_not_in_discovered_list_is_skipped_without_network_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine(
        vec![provider_with_caps(
            "p1",
            &server.uri(),
            &["k"],
            Capabilities {
                openai: true,
                anthropic: false,
            },
            &["gpt-4o"],
        )],
        vec![AliasConfig::new(
            "fast",
            vec![TargetConfig::new("p1", "some-other-model")],
        )],
    );

    let err = engine.dispatch(&chat_inbound("fast")).await.unwrap_err();
    match err {
        RelayError::AllTargetsFailed { attempts, .. } => {
            assert_eq!(attempts.len(), 1);
            assert!(attempts[0].reason.contains("some-other-model"));
        }
        other => panic!("expected aggregate failure, got {other:?}"),
    }
    server.verify().await;
}

#[tokio::test]
async fn credentials_rotate_round_robin_across_dispatches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .expect(4)
        .mount(&server)
        .await;

    let engine = engine(
        vec![openai_provider("p1", &server.uri(), &["k1", "k2", "k3"])],
        vec![AliasConfig::new("fast", vec![TargetConfig::new("p1", "m")])],
    );

    for _ in 0..4 {
        engine.dispatch(&chat_inbound("fast")).await.unwrap();
    }

    let requests = server.received_requests().await.unwrap();
    let auth_headers: Vec<String> = requests
        .iter()
        .map(|r| {
            r.headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        })
        .collect();
    assert_eq!(
        auth_headers,
        ["Bearer k1", "Bearer k2", "Bearer k3", "Bearer k1"]
    );
}

#[tokio::test]
async fn request_is_translated_for_messages_only_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header_exists("x-api-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-3-haiku",
            "max_tokens": 1024,
            "system": "be terse"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-haiku",
            "content": [{"type": "text", "text": "done"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 7}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(
        vec![provider_with_caps(
            "anthropic",
            &server.uri(),
            &["k"],
            Capabilities {
                openai: false,
                anthropic: true,
            },
            &[],
        )],
        vec![AliasConfig::new(
            "fast",
            vec![TargetConfig::new("anthropic", "claude-3-haiku")],
        )],
    );

    let inbound = InboundRequest::OpenAi(
        serde_json::from_value(json!({
            "model": "fast",
            "messages": [
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "hi"}
            ]
        }))
        .unwrap(),
    );

    let reply = engine.dispatch(&inbound).await.unwrap();
    match reply {
        UpstreamReply::Json { status, body } => {
            // The messages-style answer comes back in the caller's
            // chat-completion convention.
            assert_eq!(status.as_u16(), 200);
            assert_eq!(body["object"], "chat.completion");
            assert_eq!(body["choices"][0]["message"]["content"], "done");
            assert_eq!(body["usage"]["total_tokens"], 17);
        }
        UpstreamReply::Stream { .. } => panic!("expected a JSON reply"),
    }
    server.verify().await;
}

#[tokio::test]
async fn transport_failure_qualifies_for_fallback() {
    // A provider bound to a dead port fails at the transport level; the
    // alias policy covers it and the fallback answers.
    let dead = MockServer::start().await;
    let dead_uri = dead.uri();
    drop(dead);

    let fallback = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("alive")))
        .expect(1)
        .mount(&fallback)
        .await;

    let engine = engine(
        vec![
            openai_provider("p1", &dead_uri, &["k1"]),
            openai_provider("p2", &fallback.uri(), &["k2"]),
        ],
        vec![AliasConfig::new(
            "fast",
            vec![TargetConfig::new("p1", "m"), TargetConfig::new("p2", "m")],
        )],
    );

    let reply = engine.dispatch(&chat_inbound("fast")).await.unwrap();
    assert!(matches!(reply, UpstreamReply::Json { status, .. } if status.as_u16() == 200));
    fallback.verify().await;
}
