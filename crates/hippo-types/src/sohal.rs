//! Payloads of the SoHal service device itself.

use crate::notification::{DeviceEvent, Notification};
use crate::wire::{Params, WireError};
use crate::wire_object;

/// Service log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogInfo {
    pub level: u32,
}

wire_object!(LogInfo { level });

#[derive(Debug, Clone, PartialEq)]
pub enum SoHalNotification {
    Device(DeviceEvent),
    /// The service is shutting down
    Exit,
    Log(LogInfo),
}

impl Notification for SoHalNotification {
    fn decode(name: &str, params: &Params) -> Option<Result<Self, WireError>> {
        match name {
            "on_exit" => Some(Ok(SoHalNotification::Exit)),
            "on_log" => Some(params.get(0).map(SoHalNotification::Log)),
            _ => DeviceEvent::decode(name, params)
                .map(|event| event.map(SoHalNotification::Device)),
        }
    }
}
