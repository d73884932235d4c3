//! Touchmat payloads and notifications.

use crate::notification::{DeviceEvent, Notification};
use crate::wire::{Params, WireError};
use crate::{wire_enum, wire_object};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchMatState {
    pub touch: bool,
    pub active_pen: bool,
}

wire_object!(TouchMatState { touch, active_pen });

/// Point in touchmat coordinates, x in `[0, 15360]` and y in `[0, 8640]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchMatPoint {
    pub x: u32,
    pub y: u32,
}

wire_object!(TouchMatPoint { x, y });

/// Region of the mat that reports touch.
///
/// Encoded with the `top_left`/`bottom_right` keys SoHal reports. C++ SDK
/// clients set it with `start`/`stop` keys, which this type neither emits
/// nor accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveArea {
    pub enabled: bool,
    pub top_left: TouchMatPoint,
    pub bottom_right: TouchMatPoint,
}

wire_object!(ActiveArea {
    enabled,
    top_left,
    bottom_right,
});

wire_enum! {
    /// Height above the mat at which the active pen is detected.
    pub enum ActivePenRange {
        FiveMm => "five_mm",
        TenMm => "ten_mm",
        FifteenMm => "fifteen_mm",
        TwentyMm => "twenty_mm",
    }
}

/// Physical size in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

wire_object!(Size { width, height });

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TouchMatHardwareInfo {
    pub size: Size,
}

wire_object!(TouchMatHardwareInfo { size });

#[derive(Debug, Clone, PartialEq)]
pub enum TouchMatNotification {
    Device(DeviceEvent),
    ActiveArea(ActiveArea),
    ActivePenRange(ActivePenRange),
    Calibrate,
    DevicePalmRejection(bool),
    PalmRejectionTimeout(u32),
    Reset,
    State(TouchMatState),
}

impl Notification for TouchMatNotification {
    fn decode(name: &str, params: &Params) -> Option<Result<Self, WireError>> {
        let decoded = match name {
            "on_active_area" => params.get(0).map(TouchMatNotification::ActiveArea),
            "on_active_pen_range" => params.get(0).map(TouchMatNotification::ActivePenRange),
            "on_calibrate" => Ok(TouchMatNotification::Calibrate),
            "on_device_palm_rejection" => {
                params.get(0).map(TouchMatNotification::DevicePalmRejection)
            }
            "on_palm_rejection_timeout" => {
                params.get(0).map(TouchMatNotification::PalmRejectionTimeout)
            }
            "on_reset" => Ok(TouchMatNotification::Reset),
            "on_state" => params.get(0).map(TouchMatNotification::State),
            _ => {
                return DeviceEvent::decode(name, params)
                    .map(|event| event.map(TouchMatNotification::Device));
            }
        };
        Some(decoded)
    }
}
