//! # LLM Relay Gateway
//!
//! Local, zero-infrastructure request router exposing an OpenAI/Anthropic-
//! compatible HTTP surface over configurable upstream providers.
//!
//! ## Usage
//!
//! ```bash
//! # One provider, one alias with a fallback
//! PROVIDER_OPENAI_URL=https://api.openai.com \
//! PROVIDER_OPENAI_KEY=sk-... \
//! PROVIDER_GROQ_URL=https://api.groq.com/openai \
//! PROVIDER_GROQ_KEY=gsk-... \
//! ALIAS_FAST=groq:llama-3.1-8b-instant \
//! ALIAS_FAST_FALLBACK=openai:gpt-4o-mini \
//! RELAY_PORT=8787 \
//! llm-relay-gateway
//! ```

use relay_config::GatewayConfig;
use relay_providers::discover_providers;
use relay_proxy::ProxyEngine;
use relay_routing::RoutingTable;
use relay_server::{AppState, Server};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_logging();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting LLM relay gateway"
    );

    if let Err(e) = run().await {
        error!(error = %e, "gateway failed");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let GatewayConfig {
        providers,
        aliases,
        server: server_config,
    } = GatewayConfig::from_env();

    info!(
        providers = providers.len(),
        aliases = aliases.len(),
        "configuration loaded"
    );

    // One persistent, bounded connection pool shared by discovery and the
    // proxy engine.
    let client = reqwest::Client::builder()
        .connect_timeout(server_config.connect_timeout)
        .pool_max_idle_per_host(16)
        .build()?;

    // Startup barrier: every provider is probed before the listener binds,
    // so a reachable health endpoint implies discovery has completed.
    let registry = Arc::new(
        discover_providers(&client, providers, server_config.probe_timeout).await,
    );

    let table = Arc::new(RoutingTable::build(aliases, &registry));
    info!(aliases = table.len(), "routing table ready");

    let engine = Arc::new(ProxyEngine::new(
        client,
        Arc::clone(&registry),
        Arc::clone(&table),
        server_config.upstream_timeout,
    ));

    let state = AppState::new(
        server_config.clone(),
        registry,
        table,
        engine,
    );

    let server = Server::bind(&server_config, state).await?;
    server.run().await?;

    Ok(())
}
