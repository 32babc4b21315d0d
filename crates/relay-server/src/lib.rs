//! # Relay Server
//!
//! HTTP dispatcher for the LLM relay gateway.
//!
//! This crate provides:
//! - Axum routes for the health, model-list, and chat endpoints
//! - Bounded request-body reading with structured JSON errors
//! - Port negotiation: direct bind with sequential retry on address-in-use
//! - Graceful shutdown handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ServerError};
pub use routes::create_router;
pub use server::{bind_with_retry, Server};
pub use state::AppState;

/// Service identity reported by the health endpoint. The lifecycle manager
/// matches on this when scanning ports for the gateway it spawned.
pub const SERVICE_NAME: &str = "llm-relay-gateway";
