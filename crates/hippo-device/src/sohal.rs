//! Proxy for the SoHal service itself.

use std::ops::Deref;

use hippo_rpc::ConnectionConfig;
use hippo_types::{Facility, LogInfo, Result, SoHalNotification};

use crate::device::Device;

pub const DEVICE_NAME: &str = "sohal";

/// Typed handle for `sohal@0`.
#[derive(Debug)]
pub struct SoHal {
    device: Device<SoHalNotification>,
}

impl Default for SoHal {
    fn default() -> Self {
        Self::new()
    }
}

impl SoHal {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ConnectionConfig::default())
    }

    #[must_use]
    pub fn with_config(config: ConnectionConfig) -> Self {
        Self {
            device: Device::new(config, DEVICE_NAME, 0, Facility::SoHal),
        }
    }

    /// Ask the service to shut down.
    ///
    /// # Errors
    ///
    /// Returns connection errors or the server's error.
    pub async fn exit(&self) -> Result<()> {
        self.device.get("exit").await
    }

    /// # Errors
    ///
    /// Returns connection errors, the server's error, or `MessageError` if
    /// the reply does not decode.
    pub async fn log(&self) -> Result<LogInfo> {
        self.device.get("log").await
    }

    /// # Errors
    ///
    /// See [`SoHal::log`].
    pub async fn set_log(&self, log: &LogInfo) -> Result<()> {
        self.device.set("log", log).await
    }

    /// # Errors
    ///
    /// See [`SoHal::log`].
    pub async fn set_log_confirmed(&self, log: &LogInfo) -> Result<LogInfo> {
        self.device.set_confirmed("log", log).await
    }

    /// # Errors
    ///
    /// See [`SoHal::log`].
    pub async fn version(&self) -> Result<String> {
        self.device.get("version").await
    }
}

impl Deref for SoHal {
    type Target = Device<SoHalNotification>;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
