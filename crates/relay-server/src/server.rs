//! Server startup: port negotiation, serving, graceful shutdown.

use crate::{error::ServerError, routes::create_router, state::AppState};
use relay_config::ServerConfig;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Bind the requested port, advancing to the next sequential port on an
/// address-in-use fault, up to `retries` extra attempts.
///
/// The bind is attempted directly rather than pre-checked: a free-at-
/// inspection port can be taken by the time of the actual bind, so the
/// only reliable probe is the bind itself. Any fault other than
/// address-in-use propagates immediately.
///
/// # Errors
/// [`ServerError::NoFreePort`] when the whole window is occupied;
/// [`ServerError::Bind`] for any other bind fault.
pub async fn bind_with_retry(
    host: &str,
    port: u16,
    retries: u32,
) -> Result<TcpListener, ServerError> {
    for attempt in 0..=retries {
        let Some(candidate) = port.checked_add(attempt as u16) else {
            break;
        };
        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => {
                if attempt > 0 {
                    info!(
                        requested = port,
                        bound = candidate,
                        "requested port in use, bound next free port"
                    );
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                debug!(port = candidate, "address in use, trying next port");
            }
            Err(e) => {
                return Err(ServerError::Bind {
                    host: host.to_string(),
                    port: candidate,
                    source: e,
                })
            }
        }
    }
    Err(ServerError::NoFreePort {
        start: port,
        end: port.saturating_add(retries as u16),
    })
}

/// The bound gateway server, ready to run.
pub struct Server {
    listener: TcpListener,
    state: AppState,
}

impl Server {
    /// Negotiate a port and bind the listener.
    ///
    /// # Errors
    /// Propagates bind faults and port exhaustion.
    pub async fn bind(config: &ServerConfig, state: AppState) -> Result<Self, ServerError> {
        let listener = bind_with_retry(&config.host, config.port, config.bind_retries).await?;
        Ok(Self { listener, state })
    }

    /// The actually-bound address, which may differ from the requested
    /// port after negotiation.
    ///
    /// # Errors
    /// Propagates listener introspection faults.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until ctrl-c or SIGTERM.
    ///
    /// # Errors
    /// Propagates fatal serve faults.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.local_addr()?;
        info!(%addr, "gateway listening");

        let router = create_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
