//! Conversion between Rust values and the JSON tree sent to SoHal.
//!
//! Decoding is strict: integers, floats, booleans and strings are told apart
//! exactly, so a float field holding `1` is rejected the same way a missing
//! key is. Nothing here panics on malformed input.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub use serde_json::{Map, Value};

use crate::error::{ErrorKind, Facility, HippoError};

/// Failure while encoding or decoding a wire value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("expected JSON {expected}")]
    Type { expected: &'static str },

    #[error("missing key '{0}'")]
    MissingKey(&'static str),

    #[error("unknown name '{0}'")]
    UnknownName(String),

    #[error("value out of range for {0}")]
    OutOfRange(&'static str),

    #[error("invalid base64: {0}")]
    Base64(String),

    #[error("missing parameter {0}")]
    MissingParam(usize),

    #[error("parameter {index}: {reason}")]
    BadParam { index: usize, reason: String },

    #[error("cannot encode {0}")]
    Unencodable(&'static str),

    #[error("malformed JSON: {0}")]
    Malformed(String),
}

impl WireError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            WireError::Type { .. }
            | WireError::MissingKey(_)
            | WireError::UnknownName(_)
            | WireError::OutOfRange(_)
            | WireError::Base64(_) => ErrorKind::MessageError,
            WireError::MissingParam(_)
            | WireError::BadParam { .. }
            | WireError::Unencodable(_) => ErrorKind::InvalidParam,
            WireError::Malformed(_) => ErrorKind::Error,
        }
    }

    #[must_use]
    pub fn into_error(self, facility: Facility) -> HippoError {
        HippoError::new(facility, self.kind()).with_message(self.to_string())
    }
}

impl From<serde_json::Error> for WireError {
    fn from(e: serde_json::Error) -> Self {
        WireError::Malformed(e.to_string())
    }
}

/// A value with a JSON wire representation.
pub trait Wire: Sized {
    /// Encode into a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `WireError::Unencodable` if the value has no JSON form.
    fn to_wire(&self) -> Result<Value, WireError>;

    /// Decode from a JSON value, checking every type on the way.
    ///
    /// # Errors
    ///
    /// Returns a `WireError` describing the first mismatch found.
    fn from_wire(value: &Value) -> Result<Self, WireError>;
}

/// Parse JSON text into a typed value.
///
/// # Errors
///
/// Returns `WireError::Malformed` for invalid JSON, otherwise whatever
/// `T::from_wire` reports.
pub fn from_str<T: Wire>(text: &str) -> Result<T, WireError> {
    let value: Value = serde_json::from_str(text)?;
    T::from_wire(&value)
}

impl Wire for bool {
    fn to_wire(&self) -> Result<Value, WireError> {
        Ok(Value::Bool(*self))
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        value.as_bool().ok_or(WireError::Type {
            expected: "boolean",
        })
    }
}

macro_rules! wire_integer {
    ($($ty:ty),+) => {
        $(
            impl Wire for $ty {
                fn to_wire(&self) -> Result<Value, WireError> {
                    Ok(Value::from(*self))
                }

                fn from_wire(value: &Value) -> Result<Self, WireError> {
                    let n = value
                        .as_i64()
                        .map(i128::from)
                        .or_else(|| value.as_u64().map(i128::from))
                        .ok_or(WireError::Type { expected: "integer" })?;
                    <$ty>::try_from(n).map_err(|_| WireError::OutOfRange(stringify!($ty)))
                }
            }
        )+
    };
}

wire_integer!(i8, i16, i32, i64, u8, u16, u32, u64);

impl Wire for f64 {
    fn to_wire(&self) -> Result<Value, WireError> {
        serde_json::Number::from_f64(*self)
            .map(Value::Number)
            .ok_or(WireError::Unencodable("non-finite float"))
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        match value {
            Value::Number(n) if n.is_f64() => n.as_f64().ok_or(WireError::Type { expected: "float" }),
            _ => Err(WireError::Type { expected: "float" }),
        }
    }
}

impl Wire for f32 {
    fn to_wire(&self) -> Result<Value, WireError> {
        f64::from(*self).to_wire()
    }

    // Wire floats originate from f32 values on both ends
    #[allow(clippy::cast_possible_truncation)]
    fn from_wire(value: &Value) -> Result<Self, WireError> {
        f64::from_wire(value).map(|v| v as f32)
    }
}

impl Wire for String {
    fn to_wire(&self) -> Result<Value, WireError> {
        Ok(Value::String(self.clone()))
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or(WireError::Type { expected: "string" })
    }
}

impl<T: Wire> Wire for Vec<T> {
    fn to_wire(&self) -> Result<Value, WireError> {
        self.iter()
            .map(Wire::to_wire)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        value
            .as_array()
            .ok_or(WireError::Type { expected: "array" })?
            .iter()
            .map(T::from_wire)
            .collect()
    }
}

impl Wire for Value {
    fn to_wire(&self) -> Result<Value, WireError> {
        Ok(self.clone())
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        Ok(value.clone())
    }
}

/// Results of void methods carry no payload worth checking.
impl Wire for () {
    fn to_wire(&self) -> Result<Value, WireError> {
        Ok(Value::Null)
    }

    fn from_wire(_value: &Value) -> Result<Self, WireError> {
        Ok(())
    }
}

/// Owned byte buffer sent as a base64 string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct B64Bytes(Vec<u8>);

impl B64Bytes {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// A zero-filled buffer of `len` bytes.
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        Self(vec![0; len])
    }

    pub fn resize(&mut self, len: usize) {
        self.0.resize(len, 0);
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl std::ops::Deref for B64Bytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::DerefMut for B64Bytes {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl From<Vec<u8>> for B64Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for B64Bytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Wire for B64Bytes {
    fn to_wire(&self) -> Result<Value, WireError> {
        Ok(Value::String(STANDARD.encode(&self.0)))
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        let text = value.as_str().ok_or(WireError::Type { expected: "string" })?;
        STANDARD
            .decode(text)
            .map(Self)
            .map_err(|e| WireError::Base64(e.to_string()))
    }
}

/// Owned UTF-16 text sent as a plain JSON string.
///
/// Characters outside the basic plane are held as surrogate pairs and
/// survive the trip unchanged. A lone surrogate cannot be encoded.
///
/// C++ SDK peers carry `wcharptr` as base64 of NUL-terminated UTF-8
/// instead. Against such a peer the base64 text arrives verbatim, so
/// software devices that take or return wide strings only interoperate
/// with clients built on this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WideString(Vec<u16>);

impl WideString {
    #[must_use]
    pub fn from_units(units: Vec<u16>) -> Self {
        Self(units)
    }

    #[must_use]
    pub fn units(&self) -> &[u16] {
        &self.0
    }

    pub fn units_mut(&mut self) -> &mut [u16] {
        &mut self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn resize(&mut self, len: usize) {
        self.0.resize(len, 0);
    }

    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }
}

impl From<&str> for WideString {
    fn from(text: &str) -> Self {
        Self(text.encode_utf16().collect())
    }
}

impl std::fmt::Display for WideString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl Wire for WideString {
    fn to_wire(&self) -> Result<Value, WireError> {
        String::from_utf16(&self.0)
            .map(Value::String)
            .map_err(|_| WireError::Unencodable("unpaired UTF-16 surrogate"))
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        value
            .as_str()
            .map(Self::from)
            .ok_or(WireError::Type { expected: "string" })
    }
}

/// Borrowed view of a JSON object with typed field access.
pub struct Object<'a>(&'a Map<String, Value>);

impl<'a> Object<'a> {
    /// # Errors
    ///
    /// Returns `WireError::Type` if `value` is not an object.
    pub fn new(value: &'a Value) -> Result<Self, WireError> {
        value
            .as_object()
            .map(Self)
            .ok_or(WireError::Type { expected: "object" })
    }

    /// # Errors
    ///
    /// Returns `WireError::MissingKey` if the key is absent, or the field's
    /// own decode error.
    pub fn field<T: Wire>(&self, key: &'static str) -> Result<T, WireError> {
        let value = self.0.get(key).ok_or(WireError::MissingKey(key))?;
        T::from_wire(value)
    }
}

/// Positional parameter list of a request or notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<Value>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the raw `params` member. A missing or null member is an
    /// empty list and a non-array value is a single parameter.
    #[must_use]
    pub fn from_value(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self(Vec::new()),
            Some(Value::Array(items)) => Self(items),
            Some(other) => Self(vec![other]),
        }
    }

    /// # Errors
    ///
    /// Returns the encode error of `value`.
    pub fn with<T: Wire>(mut self, value: &T) -> Result<Self, WireError> {
        self.0.push(value.to_wire()?);
        Ok(self)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Value> {
        self.0.first()
    }

    /// Decode parameter `index`.
    ///
    /// # Errors
    ///
    /// Returns `WireError::MissingParam` when there is no such parameter and
    /// `WireError::BadParam` when it does not decode as `T`.
    pub fn get<T: Wire>(&self, index: usize) -> Result<T, WireError> {
        let value = self.0.get(index).ok_or(WireError::MissingParam(index))?;
        T::from_wire(value).map_err(|e| WireError::BadParam {
            index,
            reason: e.to_string(),
        })
    }

    /// The `params` member to put on the wire, omitted when empty.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        (!self.0.is_empty()).then_some(Value::Array(self.0))
    }
}

/// Implement [`Wire`] for a struct whose wire keys match its field names.
#[macro_export]
macro_rules! wire_object {
    ($name:ident { $($field:ident),+ $(,)? }) => {
        impl $crate::wire::Wire for $name {
            fn to_wire(&self) -> ::std::result::Result<$crate::wire::Value, $crate::wire::WireError> {
                let mut map = $crate::wire::Map::new();
                $(
                    map.insert(
                        stringify!($field).to_string(),
                        $crate::wire::Wire::to_wire(&self.$field)?,
                    );
                )+
                Ok($crate::wire::Value::Object(map))
            }

            fn from_wire(value: &$crate::wire::Value) -> ::std::result::Result<Self, $crate::wire::WireError> {
                let object = $crate::wire::Object::new(value)?;
                Ok(Self {
                    $( $field: object.field(stringify!($field))?, )+
                })
            }
        }
    };
}

/// Declare an enum sent on the wire as one of a closed set of names.
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $wire ),+
                }
            }

            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.name() == name)
            }
        }

        impl $crate::wire::Wire for $name {
            fn to_wire(&self) -> ::std::result::Result<$crate::wire::Value, $crate::wire::WireError> {
                Ok($crate::wire::Value::String(self.name().to_string()))
            }

            fn from_wire(value: &$crate::wire::Value) -> ::std::result::Result<Self, $crate::wire::WireError> {
                let name = value
                    .as_str()
                    .ok_or($crate::wire::WireError::Type { expected: "string" })?;
                Self::from_name(name)
                    .ok_or_else(|| $crate::wire::WireError::UnknownName(name.to_string()))
            }
        }
    };
}
