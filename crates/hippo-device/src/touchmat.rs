//! Touch mat proxy.

use std::ops::Deref;

use hippo_rpc::ConnectionConfig;
use hippo_types::{
    ActiveArea, ActivePenRange, Facility, Result, TouchMatHardwareInfo, TouchMatNotification,
    TouchMatState,
};

use crate::device::Device;

pub const DEVICE_NAME: &str = "touchmat";

/// Typed handle for `touchmat@<index>`.
///
/// Common operations (`open`, `subscribe`, ...) come from [`Device`]
/// through `Deref`.
#[derive(Debug)]
pub struct TouchMat {
    device: Device<TouchMatNotification>,
}

impl TouchMat {
    /// Touch mat `index` on the default SoHal.
    #[must_use]
    pub fn new(index: u32) -> Self {
        Self::with_config(ConnectionConfig::default(), index)
    }

    #[must_use]
    pub fn with_config(config: ConnectionConfig, index: u32) -> Self {
        Self {
            device: Device::new(config, DEVICE_NAME, index, Facility::TouchMat),
        }
    }

    /// # Errors
    ///
    /// Returns connection errors, the server's error, or `MessageError` if
    /// the reply does not decode.
    pub async fn active_area(&self) -> Result<ActiveArea> {
        self.device.get("active_area").await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn set_active_area(&self, area: &ActiveArea) -> Result<()> {
        self.device.set("active_area", area).await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn set_active_area_confirmed(&self, area: &ActiveArea) -> Result<ActiveArea> {
        self.device.set_confirmed("active_area", area).await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn active_pen_range(&self) -> Result<ActivePenRange> {
        self.device.get("active_pen_range").await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn set_active_pen_range(&self, range: ActivePenRange) -> Result<()> {
        self.device.set("active_pen_range", &range).await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn set_active_pen_range_confirmed(
        &self,
        range: ActivePenRange,
    ) -> Result<ActivePenRange> {
        self.device.set_confirmed("active_pen_range", &range).await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn calibrate(&self) -> Result<()> {
        self.device.get("calibrate").await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn device_palm_rejection(&self) -> Result<bool> {
        self.device.get("device_palm_rejection").await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn set_device_palm_rejection(&self, enabled: bool) -> Result<()> {
        self.device.set("device_palm_rejection", &enabled).await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn set_device_palm_rejection_confirmed(&self, enabled: bool) -> Result<bool> {
        self.device
            .set_confirmed("device_palm_rejection", &enabled)
            .await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn hardware_info(&self) -> Result<TouchMatHardwareInfo> {
        self.device.get("hardware_info").await
    }

    /// Palm rejection timeout in milliseconds.
    ///
    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn palm_rejection_timeout(&self) -> Result<u32> {
        self.device.get("palm_rejection_timeout").await
    }

    /// The device validates the range; out-of-range values come back as
    /// `ParamOutOfRange`.
    ///
    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn set_palm_rejection_timeout(&self, timeout_ms: u32) -> Result<()> {
        self.device
            .set("palm_rejection_timeout", &timeout_ms)
            .await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn set_palm_rejection_timeout_confirmed(&self, timeout_ms: u32) -> Result<u32> {
        self.device
            .set_confirmed("palm_rejection_timeout", &timeout_ms)
            .await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn reset(&self) -> Result<()> {
        self.device.get("reset").await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn state(&self) -> Result<TouchMatState> {
        self.device.get("state").await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn set_state(&self, state: &TouchMatState) -> Result<()> {
        self.device.set("state", state).await
    }

    /// # Errors
    ///
    /// See [`TouchMat::active_area`].
    pub async fn set_state_confirmed(&self, state: &TouchMatState) -> Result<TouchMatState> {
        self.device.set_confirmed("state", state).await
    }
}

impl Deref for TouchMat {
    type Target = Device<TouchMatNotification>;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
