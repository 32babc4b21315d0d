//! Boot-time capability discovery.
//!
//! Every registered provider is probed once with each of the two wire
//! conventions' model-list requests. Probes are independent and
//! individually time-bounded; a provider satisfying neither probe stays
//! registered for diagnostics but is excluded from routing. Discovery for
//! all providers completes before the HTTP dispatcher starts accepting
//! traffic.

use crate::registry::{Capabilities, Provider, ProviderRegistry};
use relay_config::ProviderConfig;
use relay_core::{ApiFormat, ANTHROPIC_VERSION};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Probe every configured provider and build the frozen registry.
///
/// Providers are probed concurrently; within one provider the two format
/// probes also run concurrently. This is the startup barrier: the returned
/// registry is complete.
pub async fn discover_providers(
    client: &reqwest::Client,
    configs: Vec<ProviderConfig>,
    probe_timeout: Duration,
) -> ProviderRegistry {
    let probes = configs
        .into_iter()
        .map(|config| discover_one(client, config, probe_timeout));
    let providers = futures::future::join_all(probes).await;

    let routable = providers.iter().filter(|p| p.is_routable()).count();
    info!(
        providers = providers.len(),
        routable, "capability discovery complete"
    );

    ProviderRegistry::new(providers)
}

async fn discover_one(
    client: &reqwest::Client,
    config: ProviderConfig,
    probe_timeout: Duration,
) -> Provider {
    let mut provider = Provider::new(config);

    let (openai_models, anthropic_models) = tokio::join!(
        probe(client, &provider, ApiFormat::OpenAi, probe_timeout),
        probe(client, &provider, ApiFormat::Anthropic, probe_timeout),
    );

    let capabilities = Capabilities {
        openai: openai_models.is_some(),
        anthropic: anthropic_models.is_some(),
    };

    let mut models = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for id in openai_models
        .into_iter()
        .flatten()
        .chain(anthropic_models.into_iter().flatten())
    {
        if seen.insert(id.clone()) {
            models.push(id);
        }
    }

    if capabilities.openai || capabilities.anthropic {
        debug!(
            provider = provider.id(),
            openai = capabilities.openai,
            anthropic = capabilities.anthropic,
            models = models.len(),
            "provider discovered"
        );
    } else {
        warn!(
            provider = provider.id(),
            "provider answered neither probe; registered but excluded from routing"
        );
    }

    provider.set_discovered(capabilities, models);
    provider
}

/// One model-list probe. `Some(models)` on a 2xx answer, `None` otherwise.
async fn probe(
    client: &reqwest::Client,
    provider: &Provider,
    format: ApiFormat,
    probe_timeout: Duration,
) -> Option<Vec<String>> {
    let url = provider.endpoint(format.models_path());
    let key = provider.first_credential();

    let request = match format {
        ApiFormat::OpenAi => client
            .get(&url)
            .bearer_auth(key.expose_secret()),
        ApiFormat::Anthropic => client
            .get(&url)
            .header("x-api-key", key.expose_secret().as_str())
            .header("anthropic-version", ANTHROPIC_VERSION),
    };

    match request.timeout(probe_timeout).send().await {
        Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
            Ok(body) => Some(extract_model_ids(&body)),
            Err(e) => {
                warn!(provider = provider.id(), format = %format, error = %e, "model list unparseable");
                None
            }
        },
        Ok(resp) => {
            debug!(
                provider = provider.id(),
                format = %format,
                status = resp.status().as_u16(),
                "probe rejected"
            );
            None
        }
        Err(e) => {
            warn!(provider = provider.id(), format = %format, error = %e, "probe failed");
            None
        }
    }
}

/// Pull model ids out of a model-list body (`data[].id`).
fn extract_model_ids(body: &Value) -> Vec<String> {
    body.get("data")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|m| m.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
