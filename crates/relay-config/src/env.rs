//! Environment-variable convention parsing.
//!
//! Recognized variables:
//! - `PROVIDER_<ID>_URL` / `PROVIDER_<ID>_KEY` — a provider pair. The key
//!   value may hold several credentials separated by commas. An entry
//!   missing either half is skipped, not fatal.
//! - `ALIAS_<NAME>` — `provider` or `provider:model`; a bare provider uses
//!   the alias's public name as the upstream model.
//! - `ALIAS_<NAME>_FALLBACK` — comma-separated `provider` or
//!   `provider:model` entries, reusing the primary model when bare.
//! - `ALIAS_<NAME>_FALLBACK_ON` — comma-separated subset of
//!   `5xx,timeout,429`; defaults to all three.
//! - `RELAY_HOST` / `RELAY_PORT` — listen address.
//!
//! Env variable name segments are upper-case; alias public names are
//! derived by lowercasing and mapping `_` to `-` (`ALIAS_GPT_4O` exposes
//! `gpt-4o`).

use crate::{AliasConfig, GatewayConfig, ProviderConfig, ServerConfig, TargetConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use relay_core::FailureClass;
use std::collections::BTreeMap;
use tracing::warn;

static PROVIDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^PROVIDER_(.+)_(URL|KEY)$").expect("static regex"));

/// Parse an explicit variable set into a [`GatewayConfig`].
pub(crate) fn parse_vars<I>(vars: I) -> GatewayConfig
where
    I: IntoIterator<Item = (String, String)>,
{
    // BTreeMap for deterministic provider/alias ordering across runs.
    let vars: BTreeMap<String, String> = vars.into_iter().collect();

    let providers = parse_providers(&vars);
    let aliases = parse_aliases(&vars);
    let server = parse_server(&vars);

    GatewayConfig {
        providers,
        aliases,
        server,
    }
}

fn parse_providers(vars: &BTreeMap<String, String>) -> Vec<ProviderConfig> {
    let mut urls: BTreeMap<String, &str> = BTreeMap::new();
    let mut keys: BTreeMap<String, &str> = BTreeMap::new();

    for (name, value) in vars {
        if let Some(caps) = PROVIDER_RE.captures(name) {
            let id = caps[1].to_ascii_lowercase();
            match &caps[2] {
                "URL" => {
                    urls.insert(id, value.as_str());
                }
                _ => {
                    keys.insert(id, value.as_str());
                }
            }
        }
    }

    let mut providers = Vec::new();
    for (id, url) in &urls {
        let Some(key_value) = keys.get(id) else {
            warn!(provider = %id, "provider has a URL but no key, skipping");
            continue;
        };
        let key_list: Vec<String> = key_value.split(',').map(str::to_string).collect();
        match ProviderConfig::new(id.clone(), url, key_list) {
            Ok(p) => providers.push(p),
            Err(e) => warn!(provider = %id, error = %e, "skipping provider"),
        }
    }
    for id in keys.keys() {
        if !urls.contains_key(id) {
            warn!(provider = %id, "provider has a key but no URL, skipping");
        }
    }

    providers
}

fn parse_aliases(vars: &BTreeMap<String, String>) -> Vec<AliasConfig> {
    let mut primaries: BTreeMap<String, &str> = BTreeMap::new();
    let mut fallbacks: BTreeMap<String, &str> = BTreeMap::new();
    let mut policies: BTreeMap<String, &str> = BTreeMap::new();

    for (name, value) in vars {
        let Some(rest) = name.strip_prefix("ALIAS_") else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        // Suffix check order matters: _FALLBACK_ON before _FALLBACK.
        if let Some(base) = rest.strip_suffix("_FALLBACK_ON") {
            policies.insert(base.to_string(), value.as_str());
        } else if let Some(base) = rest.strip_suffix("_FALLBACK") {
            fallbacks.insert(base.to_string(), value.as_str());
        } else {
            primaries.insert(rest.to_string(), value.as_str());
        }
    }

    let mut aliases = Vec::new();
    for (raw_name, primary) in &primaries {
        let public_name = public_alias_name(raw_name);
        let Some(primary_target) = parse_target(primary, &public_name) else {
            warn!(alias = %public_name, value = %primary, "alias has an empty target, skipping");
            continue;
        };

        let mut targets = vec![primary_target.clone()];
        if let Some(list) = fallbacks.get(raw_name) {
            for entry in list.split(',') {
                // Bare provider ids reuse the primary's upstream model.
                if let Some(t) = parse_target(entry, &primary_target.model) {
                    targets.push(t);
                }
            }
        }

        let mut alias = AliasConfig::new(public_name.clone(), targets);
        if let Some(policy) = policies.get(raw_name) {
            let classes: Vec<FailureClass> = policy
                .split(',')
                .filter_map(|tok| {
                    let parsed = FailureClass::parse(tok);
                    if parsed.is_none() && !tok.trim().is_empty() {
                        warn!(alias = %public_name, token = %tok, "unknown fallback class, ignoring");
                    }
                    parsed
                })
                .collect();
            if !classes.is_empty() {
                alias = alias.with_fallback_on(classes);
            }
        }
        aliases.push(alias);
    }

    for raw_name in fallbacks.keys() {
        if !primaries.contains_key(raw_name) {
            warn!(
                alias = %public_alias_name(raw_name),
                "fallback list without a primary alias definition, ignoring"
            );
        }
    }

    aliases
}

fn parse_server(vars: &BTreeMap<String, String>) -> ServerConfig {
    let mut server = ServerConfig::default();
    if let Some(host) = vars.get("RELAY_HOST") {
        if !host.trim().is_empty() {
            server.host = host.trim().to_string();
        }
    }
    if let Some(port) = vars.get("RELAY_PORT") {
        match port.trim().parse::<u16>() {
            Ok(p) => server.port = p,
            Err(_) => warn!(value = %port, "RELAY_PORT is not a valid port, using default"),
        }
    }
    server
}

/// `provider` or `provider:model`, with a default model for bare entries.
fn parse_target(entry: &str, default_model: &str) -> Option<TargetConfig> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }
    match entry.split_once(':') {
        Some((provider, model)) if !provider.trim().is_empty() && !model.trim().is_empty() => {
            Some(TargetConfig::new(provider.trim(), model.trim()))
        }
        Some((provider, _)) => {
            let provider = provider.trim();
            if provider.is_empty() {
                None
            } else {
                Some(TargetConfig::new(provider, default_model))
            }
        }
        None => Some(TargetConfig::new(entry, default_model)),
    }
}

/// Env name segment to public alias name: lowercase, `_` becomes `-`.
fn public_alias_name(raw: &str) -> String {
    raw.to_ascii_lowercase().replace('_', "-")
}
