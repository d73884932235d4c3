//! Client side of a software device.

use std::ops::Deref;
use std::time::Duration;

use hippo_rpc::ConnectionConfig;
use hippo_types::{Facility, Params, Result, SwNotification, Wire};

use crate::device::Device;

/// Handle for a device served by another process through SoHal.
///
/// Software devices pick their own method names, so calls are untyped on
/// this side; typed wrappers such as the adder client sit on top.
#[derive(Debug)]
pub struct SwDeviceClient {
    device: Device<SwNotification>,
}

impl SwDeviceClient {
    #[must_use]
    pub fn new(config: ConnectionConfig, name: impl Into<String>, index: u32) -> Self {
        Self {
            device: Device::new(config, name, index, Facility::SwDevice),
        }
    }

    /// Call `method` with a per-method timeout. Zero waits forever.
    ///
    /// # Errors
    ///
    /// Returns connection errors, the device's error, or `MessageError` if
    /// the reply does not decode as `T`.
    pub async fn call<T: Wire>(&self, method: &str, params: Params, timeout: Duration) -> Result<T> {
        self.device.call_with_timeout(method, params, timeout).await
    }
}

impl Deref for SwDeviceClient {
    type Target = Device<SwNotification>;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
