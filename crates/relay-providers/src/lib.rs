//! # Relay Providers
//!
//! Provider registry, credential rotation, and boot-time capability
//! discovery for the LLM relay gateway.
//!
//! Providers are mutated only while discovery runs; once the registry is
//! built they are read-only shared state, and the per-provider credential
//! cursor is the sole mutable field touched on the request path.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod discovery;
pub mod registry;

pub use discovery::discover_providers;
pub use registry::{Capabilities, Provider, ProviderRegistry};
