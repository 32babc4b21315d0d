//! # Relay Proxy
//!
//! The proxy engine: converts a resolved request into the target provider's
//! wire format, dispatches it with provider-specific auth and credential
//! rotation, streams the response back without buffering, and advances
//! through fallback targets on qualifying failures.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod translate;

pub use engine::{InboundRequest, ProxyEngine, UpstreamReply};
