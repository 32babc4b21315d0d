//! # Relay Config
//!
//! Configuration loading for the LLM relay gateway.
//!
//! Configuration is a structured [`GatewayConfig`] object built once at
//! boot. The environment-variable convention (`PROVIDER_<ID>_URL`,
//! `ALIAS_<NAME>`, ...) is one way to build it; tests and embedders can
//! construct the same object programmatically without touching the process
//! environment.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod env;

use relay_core::FailureClass;
use secrecy::SecretString;
use std::time::Duration;
use url::Url;

/// A configured upstream provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Unique provider id (lowercase).
    pub id: String,
    /// Base URL of the provider API.
    pub base_url: Url,
    /// One or more credentials, rotated round-robin per outbound call.
    pub api_keys: Vec<SecretString>,
}

impl ProviderConfig {
    /// Build a provider entry, validating the base URL.
    ///
    /// # Errors
    /// Returns a configuration error if the URL does not parse as http(s)
    /// or no credential is supplied.
    pub fn new(
        id: impl Into<String>,
        base_url: &str,
        api_keys: Vec<String>,
    ) -> Result<Self, relay_core::RelayError> {
        let id = id.into().to_ascii_lowercase();
        let url = Url::parse(base_url).map_err(|e| {
            relay_core::RelayError::configuration(format!(
                "provider '{id}' has an invalid base URL '{base_url}': {e}"
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(relay_core::RelayError::configuration(format!(
                "provider '{id}' base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        let keys: Vec<SecretString> = api_keys
            .into_iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| SecretString::new(k.trim().to_string()))
            .collect();
        if keys.is_empty() {
            return Err(relay_core::RelayError::configuration(format!(
                "provider '{id}' has no usable credential"
            )));
        }
        Ok(Self {
            id,
            base_url: url,
            api_keys: keys,
        })
    }
}

/// A single routing target: provider id plus upstream model name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    /// Provider id the target dispatches to.
    pub provider: String,
    /// Upstream model name sent to that provider.
    pub model: String,
}

impl TargetConfig {
    /// Create a target.
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into().to_ascii_lowercase(),
            model: model.into(),
        }
    }
}

/// A public alias and its ordered target list.
#[derive(Debug, Clone)]
pub struct AliasConfig {
    /// Public model name exposed by the gateway.
    pub name: String,
    /// Targets in declared order: primary first, then fallbacks.
    pub targets: Vec<TargetConfig>,
    /// Failure classes that justify advancing to the next target.
    pub fallback_on: Vec<FailureClass>,
}

impl AliasConfig {
    /// Create an alias with the default fallback policy (all classes).
    pub fn new(name: impl Into<String>, targets: Vec<TargetConfig>) -> Self {
        Self {
            name: name.into(),
            targets,
            fallback_on: default_fallback_classes(),
        }
    }

    /// Override the fallback-trigger classes.
    #[must_use]
    pub fn with_fallback_on(mut self, classes: Vec<FailureClass>) -> Self {
        self.fallback_on = classes;
        self
    }
}

/// Default fallback-trigger set: every qualifying class.
#[must_use]
pub fn default_fallback_classes() -> Vec<FailureClass> {
    vec![
        FailureClass::ServerError,
        FailureClass::Timeout,
        FailureClass::RateLimited,
    ]
}

/// HTTP server and timeout settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen host.
    pub host: String,
    /// Requested listen port; the actual port may differ after bind retry.
    pub port: u16,
    /// How many sequential ports to try past the requested one when the
    /// requested port is already in use.
    pub bind_retries: u32,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
    /// Bound on reading an inbound request body.
    pub body_read_timeout: Duration,
    /// Per-probe timeout for boot-time capability discovery.
    pub probe_timeout: Duration,
    /// Connect timeout for outbound upstream calls.
    pub connect_timeout: Duration,
    /// Total timeout for non-streaming upstream calls.
    pub upstream_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            bind_retries: 10,
            max_body_bytes: 2 * 1024 * 1024,
            body_read_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(7),
            connect_timeout: Duration::from_secs(10),
            upstream_timeout: Duration::from_secs(120),
        }
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Registered providers.
    pub providers: Vec<ProviderConfig>,
    /// Configured aliases.
    pub aliases: Vec<AliasConfig>,
    /// Server and timeout settings.
    pub server: ServerConfig,
}

impl GatewayConfig {
    /// Build configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build configuration from an explicit variable set.
    ///
    /// This is the programmatic entry point `from_env` delegates to;
    /// entries that are malformed or incomplete are logged and skipped,
    /// never fatal.
    #[must_use]
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        env::parse_vars(vars)
    }

    /// Add a provider.
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.push(provider);
        self
    }

    /// Add an alias.
    #[must_use]
    pub fn with_alias(mut self, alias: AliasConfig) -> Self {
        self.aliases.push(alias);
        self
    }

    /// Replace server settings.
    #[must_use]
    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            aliases: Vec::new(),
            server: ServerConfig::default(),
        }
    }
}
