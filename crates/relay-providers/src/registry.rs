//! Provider state and the read-only registry built after discovery.

use relay_core::ApiFormat;
use relay_config::ProviderConfig;
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// Wire formats a provider was observed to accept during discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Answered the bearer-token model-list probe (format A).
    pub openai: bool,
    /// Answered the api-key/version model-list probe (format B).
    pub anthropic: bool,
}

impl Capabilities {
    /// Whether the provider accepts the given format.
    #[must_use]
    pub fn supports(self, format: ApiFormat) -> bool {
        match format {
            ApiFormat::OpenAi => self.openai,
            ApiFormat::Anthropic => self.anthropic,
        }
    }
}

/// An upstream provider with discovered capabilities.
///
/// Everything except the credential cursor is immutable after discovery.
#[derive(Debug)]
pub struct Provider {
    id: String,
    base_url: Url,
    api_keys: Vec<SecretString>,
    cursor: AtomicUsize,
    capabilities: Capabilities,
    models: Vec<String>,
}

impl Provider {
    /// Create an undiscovered provider from its configuration.
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            id: config.id,
            base_url: config.base_url,
            api_keys: config.api_keys,
            cursor: AtomicUsize::new(0),
            capabilities: Capabilities::default(),
            models: Vec::new(),
        }
    }

    /// Record discovery results. Called once per provider during boot,
    /// before the registry is built.
    pub fn set_discovered(&mut self, capabilities: Capabilities, models: Vec<String>) {
        self.capabilities = capabilities;
        self.models = models;
    }

    /// Provider id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Base URL of the provider API.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Discovered capability flags.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Discovered model ids, deduplicated, in discovery order.
    #[must_use]
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// A provider that satisfied neither probe stays registered for
    /// diagnostics but is excluded from routing.
    #[must_use]
    pub fn is_routable(&self) -> bool {
        self.capabilities.openai || self.capabilities.anthropic
    }

    /// Whether this provider serves the given upstream model.
    ///
    /// An empty discovered list does not veto: discovery may legitimately
    /// return no ids for a reachable provider.
    #[must_use]
    pub fn serves_model(&self, model: &str) -> bool {
        self.models.is_empty() || self.models.iter().any(|m| m == model)
    }

    /// Wire format used for dispatch to this provider, preferring the
    /// inbound convention when the provider supports it.
    #[must_use]
    pub fn dispatch_format(&self, inbound: ApiFormat) -> Option<ApiFormat> {
        if self.capabilities.supports(inbound) {
            Some(inbound)
        } else if self.capabilities.openai {
            Some(ApiFormat::OpenAi)
        } else if self.capabilities.anthropic {
            Some(ApiFormat::Anthropic)
        } else {
            None
        }
    }

    /// Next credential via the atomically-incremented round-robin cursor.
    ///
    /// Concurrent callers each observe a distinct cursor value, so rotation
    /// has no duplicate or skipped picks under load.
    #[must_use]
    pub fn next_credential(&self) -> &SecretString {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.api_keys[idx % self.api_keys.len()]
    }

    /// First configured credential. Boot-time probes use this so discovery
    /// does not advance the request-path rotation cursor.
    pub(crate) fn first_credential(&self) -> &SecretString {
        &self.api_keys[0]
    }

    /// Absolute URL for a request path under this provider's base.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

/// Read-only provider lookup built once after discovery completes.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<Provider>>,
}

impl ProviderRegistry {
    /// Build the registry from discovered providers.
    #[must_use]
    pub fn new(providers: Vec<Provider>) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|p| (p.id.clone(), Arc::new(p)))
                .collect(),
        }
    }

    /// Look up a provider by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Provider>> {
        self.providers.get(id).cloned()
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// All providers, sorted by id for stable output.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<Provider>> {
        let mut out: Vec<Arc<Provider>> = self.providers.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}
