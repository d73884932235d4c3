//! Decoding of pushed notifications by event name.

use crate::wire::{Params, WireError};

/// Event delivered when the link to SoHal drops.
pub const SOHAL_DISCONNECTED: &str = "on_sohal_disconnected";

/// Event delivered once the link is back and the subscription restored.
pub const SOHAL_CONNECTED: &str = "on_sohal_connected";

/// A per-device notification payload.
pub trait Notification: Sized + Send + 'static {
    /// Decode a push named `name` (the part after the first `.`).
    ///
    /// Returns `None` when the name is not one of this device's events.
    fn decode(name: &str, params: &Params) -> Option<Result<Self, WireError>>;
}

/// Events every device emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The last client closed the device
    Close,
    DeviceConnected,
    DeviceDisconnected,
    FactoryDefault,
    /// The first client opened the device
    Open,
    /// Open count changed; carries the new count
    OpenCount(u32),
    Resume,
    Suspend,
    SohalDisconnected,
    SohalConnected,
}

impl Notification for DeviceEvent {
    fn decode(name: &str, params: &Params) -> Option<Result<Self, WireError>> {
        let event = match name {
            "on_close" => DeviceEvent::Close,
            "on_device_connected" => DeviceEvent::DeviceConnected,
            "on_device_disconnected" => DeviceEvent::DeviceDisconnected,
            "on_factory_default" => DeviceEvent::FactoryDefault,
            "on_open" => DeviceEvent::Open,
            "on_open_count" => return Some(params.get(0).map(DeviceEvent::OpenCount)),
            "on_resume" => DeviceEvent::Resume,
            "on_suspend" => DeviceEvent::Suspend,
            SOHAL_DISCONNECTED => DeviceEvent::SohalDisconnected,
            SOHAL_CONNECTED => DeviceEvent::SohalConnected,
            _ => return None,
        };
        Some(Ok(event))
    }
}
