//! Connection settings for reaching SoHal.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 20641;

/// Environment variable overriding the host
pub const HOST_ENV: &str = "SOHAL_HOST";
/// Environment variable overriding the port
pub const PORT_ENV: &str = "SOHAL_PORT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {name}: {value}")]
    Env { name: &'static str, value: String },
}

/// Where SoHal listens and how long to wait for it.
///
/// Durations are stored in milliseconds so the JSON form stays flat:
///
/// ```json
/// { "host": "10.0.0.4", "port": 20641, "requestTimeoutMs": 2000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Budget for calls made without an explicit timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Delay between resubscription attempts after the connection drops
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_connect_timeout() -> u64 {
    5000
}
fn default_request_timeout() -> u64 {
    10_000
}
fn default_reconnect_interval() -> u64 {
    1000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            reconnect_interval_ms: default_reconnect_interval(),
        }
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Load config from a JSON file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Defaults with `SOHAL_HOST` and `SOHAL_PORT` applied.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Env` when `SOHAL_PORT` is not a port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    /// Apply `SOHAL_HOST` and `SOHAL_PORT` on top of `self`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Env` when `SOHAL_PORT` is not a port number.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(std::env::var(HOST_ENV).ok(), std::env::var(PORT_ENV).ok())
    }

    fn with_overrides(
        mut self,
        host: Option<String>,
        port: Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(host) = host.filter(|h| !h.is_empty()) {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port.trim().parse().map_err(|_| ConfigError::Env {
                name: PORT_ENV,
                value: port.clone(),
            })?;
        }
        Ok(self)
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}:{}/", self.host, self.port)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}
