//! # Relay Supervisor
//!
//! Process lifecycle manager for embedding applications.
//!
//! The supervisor spawns the relay gateway as a subprocess, determines the
//! actually-bound port via the gateway's health endpoint (the gateway may
//! negotiate past the requested port when it is in use), polls health until
//! ready, and exposes start/stop semantics. The supervisor and the gateway
//! share nothing but the negotiated port and the HTTP health contract, so
//! the only discipline across that boundary is timeout-and-retry.
//!
//! Health state per spawn attempt is monotonic:
//! `unstarted -> starting -> {ready | crashed} -> stopped`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Service identity the gateway reports on `/health`. The port scan matches
/// on this so an unrelated service on a nearby port is never mistaken for
/// the gateway we spawned.
const GATEWAY_SERVICE: &str = "llm-relay-gateway";

/// Errors surfaced to the embedding application.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The gateway executable could not be spawned.
    #[error("failed to spawn gateway process: {source}")]
    Spawn {
        /// Underlying spawn fault.
        #[source]
        source: std::io::Error,
    },

    /// The subprocess started but never became healthy, or exited early.
    #[error("gateway failed to start: {message}")]
    Startup {
        /// What went wrong.
        message: String,
    },

    /// `url()` was called while no healthy gateway is running.
    #[error("gateway is not ready")]
    NotReady,
}

/// Lifecycle state of the supervised gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// No spawn attempted yet.
    Unstarted,
    /// Subprocess spawned, health poll in progress.
    Starting,
    /// Health endpoint answered; base URL is stable.
    Ready,
    /// Spawn or startup failed, or the process died.
    Crashed,
    /// Explicitly stopped; a later `ready()` spawns anew.
    Stopped,
}

/// Supervisor settings.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Gateway executable.
    pub program: PathBuf,
    /// Extra arguments for the gateway.
    pub args: Vec<String>,
    /// Host the gateway binds and the supervisor polls.
    pub host: String,
    /// Requested port; the gateway may bind a later sequential port.
    pub port: u16,
    /// Extra environment merged over the parent's (provider and alias
    /// variables, typically).
    pub env: Vec<(String, String)>,
    /// Bound on the whole startup (spawn to healthy).
    pub startup_timeout: Duration,
    /// Delay between health poll rounds.
    pub poll_interval: Duration,
    /// How many sequential ports to scan for the negotiated bind. Must
    /// cover the gateway's own bind retry window.
    pub port_scan_width: u16,
    /// Per-request timeout for one health poll.
    pub health_timeout: Duration,
}

impl SupervisorConfig {
    /// Settings for a gateway executable on the default port.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            host: "127.0.0.1".to_string(),
            port: 8787,
            env: Vec::new(),
            startup_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(150),
            port_scan_width: 11,
            health_timeout: Duration::from_millis(750),
        }
    }

    /// Set the requested port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Merge extra environment for the subprocess.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(env.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the startup timeout.
    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

struct Inner {
    state: HealthState,
    child: Option<Child>,
    base_url: Option<String>,
}

/// Supervises at most one gateway subprocess.
///
/// `ready()` is idempotent while the process is healthy and transparently
/// respawns a dead one. The child is spawned with kill-on-drop so dropping
/// the supervisor cannot leak a gateway process.
pub struct GatewaySupervisor {
    config: SupervisorConfig,
    client: reqwest::Client,
    inner: Mutex<Inner>,
}

impl GatewaySupervisor {
    /// Create a supervisor. No process is spawned until `ready()`.
    #[must_use]
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            inner: Mutex::new(Inner {
                state: HealthState::Unstarted,
                child: None,
                base_url: None,
            }),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> HealthState {
        self.inner.lock().await.state
    }

    /// Ensure a healthy gateway is running.
    ///
    /// Returns immediately when the current process is alive and its
    /// health endpoint answers; otherwise spawns a fresh process, resolves
    /// the actually-bound port, and polls health until ready or the
    /// startup timeout elapses.
    ///
    /// # Errors
    /// Spawn and startup failures; never silently swallowed.
    pub async fn ready(&self) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock().await;

        if inner.state == HealthState::Ready {
            let alive = match inner.child.as_mut() {
                Some(child) => matches!(child.try_wait(), Ok(None)),
                None => false,
            };
            if alive {
                if let Some(url) = inner.base_url.clone() {
                    if self.check_health(&url).await {
                        return Ok(());
                    }
                }
            }
            warn!("gateway process died, respawning");
            Self::reap(&mut inner).await;
        }

        self.spawn_locked(&mut inner).await
    }

    /// Stable base URL of the running gateway.
    ///
    /// # Errors
    /// [`SupervisorError::NotReady`] unless a `ready()` call succeeded and
    /// the gateway has not been stopped since.
    pub async fn url(&self) -> Result<String, SupervisorError> {
        let inner = self.inner.lock().await;
        if inner.state != HealthState::Ready {
            return Err(SupervisorError::NotReady);
        }
        inner.base_url.clone().ok_or(SupervisorError::NotReady)
    }

    /// Terminate the subprocess, release the port, and reset cached state.
    /// Idempotent; a later `ready()` spawns a new process.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        Self::reap(&mut inner).await;
        inner.state = HealthState::Stopped;
        info!("gateway stopped");
    }

    async fn reap(inner: &mut Inner) {
        if let Some(mut child) = inner.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        inner.base_url = None;
    }

    async fn spawn_locked(&self, inner: &mut Inner) -> Result<(), SupervisorError> {
        inner.state = HealthState::Starting;
        inner.base_url = None;

        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .envs(self.config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env("RELAY_HOST", &self.config.host)
            .env("RELAY_PORT", self.config.port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                inner.state = HealthState::Crashed;
                return Err(SupervisorError::Spawn { source });
            }
        };

        debug!(
            program = %self.config.program.display(),
            requested_port = self.config.port,
            "gateway spawned, polling health"
        );

        let deadline = Instant::now() + self.config.startup_timeout;
        loop {
            // A child that exited can never become healthy; fail fast with
            // its status instead of burning the whole timeout.
            match child.try_wait() {
                Ok(Some(status)) => {
                    inner.state = HealthState::Crashed;
                    return Err(SupervisorError::Startup {
                        message: format!("gateway exited during startup with {status}"),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    inner.state = HealthState::Crashed;
                    let _ = child.start_kill();
                    return Err(SupervisorError::Startup {
                        message: format!("could not observe gateway process: {e}"),
                    });
                }
            }

            if let Some(url) = self.scan_ports().await {
                info!(url = %url, "gateway ready");
                inner.child = Some(child);
                inner.base_url = Some(url);
                inner.state = HealthState::Ready;
                return Ok(());
            }

            if Instant::now() >= deadline {
                let _ = child.start_kill();
                let _ = child.wait().await;
                inner.state = HealthState::Crashed;
                return Err(SupervisorError::Startup {
                    message: format!(
                        "health endpoint not reachable within {:?}",
                        self.config.startup_timeout
                    ),
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Scan the port window for a health endpoint answering with our
    /// service identity. Log scraping is deliberately not used; the health
    /// endpoint is the only readiness signal.
    async fn scan_ports(&self) -> Option<String> {
        for offset in 0..self.config.port_scan_width {
            let port = self.config.port.checked_add(offset)?;
            let url = format!("http://{}:{}", self.config.host, port);
            if self.check_health(&url).await {
                return Some(url);
            }
        }
        None
    }

    async fn check_health(&self, base_url: &str) -> bool {
        let request = self
            .client
            .get(format!("{base_url}/health"))
            .timeout(self.config.health_timeout);
        match request.send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
                Ok(body) => {
                    body.get("service").and_then(Value::as_str) == Some(GATEWAY_SERVICE)
                        && body.get("status").and_then(Value::as_str) == Some("ok")
                }
                Err(_) => false,
            },
            _ => false,
        }
    }
}

impl Drop for GatewaySupervisor {
    fn drop(&mut self) {
        // Best effort: the child handle's kill-on-drop does the real work;
        // this covers a child held inside a still-locked inner.
        if let Ok(mut inner) = self.inner.try_lock() {
            if let Some(child) = inner.child.as_mut() {
                let _ = child.start_kill();
            }
        }
    }
}
