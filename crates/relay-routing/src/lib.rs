//! # Relay Routing
//!
//! Alias resolution and fallback policy for the LLM relay gateway.
//!
//! The routing table maps each public model name to an ordered target list.
//! Iteration order is always declared order — primary first, then fallbacks
//! as listed. There is no dynamic reordering by latency or cost; that is an
//! explicit simplicity decision.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use relay_config::AliasConfig;
use relay_core::{FailureClass, RelayError, RelayResult};
use relay_providers::ProviderRegistry;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// A `(provider, upstream-model)` pair considered during dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Provider id.
    pub provider: String,
    /// Upstream model name sent to that provider.
    pub model: String,
}

/// The set of failure classes that justify advancing past a target.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    classes: HashSet<FailureClass>,
}

impl FallbackPolicy {
    /// Build a policy from the configured class list.
    #[must_use]
    pub fn new(classes: impl IntoIterator<Item = FailureClass>) -> Self {
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    /// Whether a failure of this class triggers fallback.
    #[must_use]
    pub fn allows(&self, class: FailureClass) -> bool {
        self.classes.contains(&class)
    }
}

/// A public alias with its ordered targets and fallback policy.
#[derive(Debug, Clone)]
pub struct Alias {
    /// Public model name.
    pub name: String,
    /// Targets in declared order.
    pub targets: Vec<Target>,
    /// Classes that justify advancing to the next target.
    pub fallback_on: FallbackPolicy,
}

/// Read-only alias lookup built at boot after discovery.
#[derive(Debug, Default)]
pub struct RoutingTable {
    aliases: HashMap<String, Alias>,
}

impl RoutingTable {
    /// Validate configured aliases against the registry and build the table.
    ///
    /// An alias whose targets all reference unregistered providers is
    /// configuration-invalid and dropped with a warning. Aliases with at
    /// least one registered target keep their full declared target list;
    /// unresolvable entries within it are skipped per-request with a
    /// recorded reason rather than silently removed, so the aggregate
    /// failure body names them.
    #[must_use]
    pub fn build(aliases: Vec<AliasConfig>, registry: &ProviderRegistry) -> Self {
        let mut table = HashMap::new();
        for alias in aliases {
            let resolvable = alias
                .targets
                .iter()
                .filter(|t| registry.get(&t.provider).is_some())
                .count();
            if resolvable == 0 {
                warn!(
                    alias = %alias.name,
                    targets = alias.targets.len(),
                    "alias has no resolvable target, rejecting"
                );
                continue;
            }

            let name = alias.name.clone();
            table.insert(
                name.clone(),
                Alias {
                    name,
                    targets: alias
                        .targets
                        .into_iter()
                        .map(|t| Target {
                            provider: t.provider,
                            model: t.model,
                        })
                        .collect(),
                    fallback_on: FallbackPolicy::new(alias.fallback_on),
                },
            );
        }
        Self { aliases: table }
    }

    /// Resolve a public model name to its alias.
    ///
    /// # Errors
    /// Returns a routing error for unknown names; no upstream call is ever
    /// made for those.
    pub fn resolve(&self, name: &str) -> RelayResult<&Alias> {
        self.aliases
            .get(name)
            .ok_or_else(|| RelayError::routing(format!("unknown model alias '{name}'")))
    }

    /// Configured alias names, sorted.
    #[must_use]
    pub fn alias_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.aliases.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of configured aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
