//! Shared application state.

use relay_config::ServerConfig;
use relay_providers::ProviderRegistry;
use relay_proxy::ProxyEngine;
use relay_routing::RoutingTable;
use std::sync::Arc;

/// State shared by all request handlers.
///
/// Everything here is read-only after boot except the credential cursors
/// buried inside the registry's providers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Server limits and timeouts.
    pub config: ServerConfig,
    /// Frozen post-discovery provider registry.
    pub registry: Arc<ProviderRegistry>,
    /// Frozen alias table.
    pub table: Arc<RoutingTable>,
    /// The proxy engine.
    pub engine: Arc<ProxyEngine>,
}

impl AppState {
    /// Assemble application state from the boot sequence's products.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        registry: Arc<ProviderRegistry>,
        table: Arc<RoutingTable>,
        engine: Arc<ProxyEngine>,
    ) -> Self {
        Self {
            config,
            registry,
            table,
            engine,
        }
    }
}
