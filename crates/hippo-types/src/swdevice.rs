//! Notifications pushed by software devices.
//!
//! Software devices define their own event names, so the payload is kept raw
//! and decoded on demand by the subscriber.

use crate::notification::Notification;
use crate::wire::{B64Bytes, Params, Value, WideString, Wire, WireError};

#[derive(Debug, Clone, PartialEq)]
pub struct SwNotification {
    /// Full event name, e.g. `on_progress`
    pub method: String,
    pub param: Option<Value>,
}

impl SwNotification {
    /// Event name without the `on_` prefix.
    #[must_use]
    pub fn event(&self) -> &str {
        self.method.strip_prefix("on_").unwrap_or(&self.method)
    }

    /// Decode the parameter as `T`. `None` when the push carried no parameter.
    #[must_use]
    pub fn value<T: Wire>(&self) -> Option<Result<T, WireError>> {
        self.param.as_ref().map(T::from_wire)
    }

    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        self.value().and_then(Result::ok)
    }

    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        self.value().and_then(Result::ok)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.value().and_then(Result::ok)
    }

    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        self.value().and_then(Result::ok)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.param.as_ref().and_then(Value::as_str)
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<B64Bytes> {
        self.value().and_then(Result::ok)
    }

    #[must_use]
    pub fn as_wide(&self) -> Option<WideString> {
        self.value().and_then(Result::ok)
    }
}

impl Notification for SwNotification {
    fn decode(name: &str, params: &Params) -> Option<Result<Self, WireError>> {
        Some(Ok(Self {
            method: name.to_string(),
            param: params.first().cloned(),
        }))
    }
}
