//! Local automation-server supervision.
//!
//! [`ServerSupervisor`] answers "is a server listening at this URL?" and can
//! launch one. [`AppiumSupervisor`] is the local implementation: it checks
//! reachability with a plain TCP connect and starts the server as a detached
//! `appium` process, then polls until the port accepts connections.

use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, info};
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors from starting a server.
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server did not start listening on port {port} after {attempts} attempts")]
    StartupTimeout { port: u16, attempts: u32 },

    #[error("invalid server url '{0}'")]
    InvalidUrl(String),
}

/// Checks for and launches an automation server.
#[async_trait]
pub trait ServerSupervisor: Send + Sync {
    /// True when something accepts TCP connections at the URL's host and port.
    async fn is_running(&self, url: &str) -> bool;

    /// Launches a server on `port` and waits until it is reachable.
    async fn start(&self, port: u16) -> Result<(), SupervisorError>;
}

/// Host and port a server URL points at.
pub fn endpoint_of(url: &str) -> Result<(String, u16), SupervisorError> {
    let parsed = Url::parse(url).map_err(|_| SupervisorError::InvalidUrl(url.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| SupervisorError::InvalidUrl(url.to_string()))?;
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| SupervisorError::InvalidUrl(url.to_string()))?;
    Ok((host.trim_matches(['[', ']']).to_string(), port))
}

/// Launches `appium` from `PATH`.
#[derive(Debug, Clone)]
pub struct AppiumSupervisor {
    program: String,
    relaxed_security: bool,
    attempts: u32,
    interval: Duration,
}

impl Default for AppiumSupervisor {
    fn default() -> Self {
        Self {
            program: "appium".to_string(),
            relaxed_security: true,
            attempts: 30,
            interval: Duration::from_millis(500),
        }
    }
}

impl AppiumSupervisor {
    pub fn new(relaxed_security: bool) -> Self {
        Self {
            relaxed_security,
            ..Default::default()
        }
    }

    /// Overrides the executable name.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Overrides the readiness polling schedule.
    pub fn with_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.attempts = attempts;
        self.interval = interval;
        self
    }

    fn args(&self, port: u16) -> Vec<String> {
        let mut args = vec!["--port".to_string(), port.to_string()];
        if self.relaxed_security {
            args.push("--relaxed-security".to_string());
        }
        args
    }
}

#[async_trait]
impl ServerSupervisor for AppiumSupervisor {
    async fn is_running(&self, url: &str) -> bool {
        let Ok((host, port)) = endpoint_of(url) else {
            return false;
        };
        matches!(
            tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host.as_str(), port))).await,
            Ok(Ok(_))
        )
    }

    async fn start(&self, port: u16) -> Result<(), SupervisorError> {
        let args = self.args(port);
        info!(program = %self.program, ?args, "starting automation server");
        Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let url = format!("http://127.0.0.1:{port}");
        for attempt in 1..=self.attempts {
            tokio::time::sleep(self.interval).await;
            if self.is_running(&url).await {
                debug!(attempt, "server is listening");
                return Ok(());
            }
        }
        Err(SupervisorError::StartupTimeout {
            port,
            attempts: self.attempts,
        })
    }
}
