//! Shared types for the SoHal client SDK.
//!
//! This crate holds what every other hippo crate agrees on: the composite
//! error code, the JSON wire codec, and the payloads and notifications of the
//! devices the SDK speaks to. Nothing here performs I/O.

pub mod device;
pub mod error;
pub mod notification;
pub mod sohal;
pub mod swdevice;
pub mod touchmat;
pub mod wire;

pub use device::{ConnectedDevice, DeviceInfo, TempSensor, TemperatureDevice, TemperatureInfo};
pub use error::{ErrorKind, Facility, HippoError, Result};
pub use notification::{DeviceEvent, Notification, SOHAL_CONNECTED, SOHAL_DISCONNECTED};
pub use sohal::{LogInfo, SoHalNotification};
pub use swdevice::SwNotification;
pub use touchmat::{
    ActiveArea, ActivePenRange, Size, TouchMatHardwareInfo, TouchMatNotification, TouchMatPoint,
    TouchMatState,
};
pub use wire::{B64Bytes, Params, WideString, Wire, WireError};

/// Property-based tests for the codec round-trip law.
///
/// Values go through `to_wire`, then JSON text, then `from_wire`, so the
/// text form is covered as well as the tree form.
#[cfg(test)]
mod proptest_roundtrip_tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip<T: Wire>(value: &T) -> T {
        let text = serde_json::to_string(&value.to_wire().unwrap()).unwrap();
        wire::from_str(&text).unwrap()
    }

    fn arb_point() -> impl Strategy<Value = TouchMatPoint> {
        (0u32..=15360, 0u32..=8640).prop_map(|(x, y)| TouchMatPoint { x, y })
    }

    fn arb_pen_range() -> impl Strategy<Value = ActivePenRange> {
        prop::sample::select(ActivePenRange::ALL.to_vec())
    }

    fn arb_sensor() -> impl Strategy<Value = TempSensor> {
        prop::sample::select(TempSensor::ALL.to_vec())
    }

    fn arb_connected_device() -> impl Strategy<Value = ConnectedDevice> {
        prop::sample::select(ConnectedDevice::ALL.to_vec())
    }

    fn arb_finite_f32() -> impl Strategy<Value = f32> {
        (-1e6f32..1e6f32).prop_filter("must be finite", |x| x.is_finite())
    }

    prop_compose! {
        fn arb_temperature()(
            connected_device in arb_connected_device(),
            index in any::<u32>(),
            current in arb_finite_f32(),
            max in arb_finite_f32(),
            safe in arb_finite_f32(),
            sensor in arb_sensor()
        ) -> TemperatureInfo {
            TemperatureInfo {
                device: TemperatureDevice { connected_device, index },
                current,
                max,
                safe,
                sensor,
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn integers_roundtrip(a in any::<i32>(), b in any::<u32>(), c in any::<i64>(), d in any::<u64>()) {
            prop_assert_eq!(roundtrip(&a), a);
            prop_assert_eq!(roundtrip(&b), b);
            prop_assert_eq!(roundtrip(&c), c);
            prop_assert_eq!(roundtrip(&d), d);
        }

        #[test]
        fn floats_roundtrip(x in arb_finite_f32()) {
            prop_assert_eq!(roundtrip(&x).to_bits(), x.to_bits());
        }

        #[test]
        fn bytes_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let bytes = B64Bytes::new(data);
            prop_assert_eq!(roundtrip(&bytes), bytes);
        }

        #[test]
        fn wide_string_roundtrip(text in any::<String>()) {
            let wide = WideString::from(text.as_str());
            let back = roundtrip(&wide);
            prop_assert_eq!(back.to_string_lossy(), text);
            prop_assert_eq!(back, wide);
        }

        #[test]
        fn touchmat_state_roundtrip(touch in any::<bool>(), active_pen in any::<bool>()) {
            let state = TouchMatState { touch, active_pen };
            prop_assert_eq!(roundtrip(&state), state);
        }

        #[test]
        fn active_area_roundtrip(enabled in any::<bool>(), top_left in arb_point(), bottom_right in arb_point()) {
            let area = ActiveArea { enabled, top_left, bottom_right };
            prop_assert_eq!(roundtrip(&area), area);
        }

        #[test]
        fn pen_range_roundtrip(range in arb_pen_range()) {
            prop_assert_eq!(roundtrip(&range), range);
        }

        #[test]
        fn temperature_roundtrip(info in arb_temperature()) {
            prop_assert_eq!(roundtrip(&info), info);
        }

        #[test]
        fn temperature_list_roundtrip(list in proptest::collection::vec(arb_temperature(), 0..8)) {
            prop_assert_eq!(roundtrip(&list), list);
        }

        #[test]
        fn unknown_enum_name_rejected(name in "[a-z_]{1,20}") {
            prop_assume!(ActivePenRange::from_name(&name).is_none());
            let decoded = ActivePenRange::from_wire(&wire::Value::String(name));
            prop_assert!(matches!(decoded, Err(WireError::UnknownName(_))));
        }
    }

    #[test]
    fn test_extreme_integers() {
        assert_eq!(roundtrip(&u32::MAX), u32::MAX);
        assert_eq!(roundtrip(&i32::MIN), i32::MIN);
        assert_eq!(roundtrip(&u64::MAX), u64::MAX);
        assert_eq!(roundtrip(&i64::MIN), i64::MIN);
    }

    #[test]
    fn test_zero_length_buffers() {
        assert!(roundtrip(&B64Bytes::default()).is_empty());
        assert!(roundtrip(&WideString::default()).is_empty());
    }

    #[test]
    fn test_missing_keys_never_panic() {
        let empty = wire::Value::Object(wire::Map::new());
        let kind = |e: WireError| e.kind();
        assert_eq!(TouchMatState::from_wire(&empty).map_err(kind), Err(ErrorKind::MessageError));
        assert_eq!(ActiveArea::from_wire(&empty).map_err(kind), Err(ErrorKind::MessageError));
        assert_eq!(TouchMatHardwareInfo::from_wire(&empty).map_err(kind), Err(ErrorKind::MessageError));
        assert_eq!(DeviceInfo::from_wire(&empty).map_err(kind), Err(ErrorKind::MessageError));
        assert_eq!(TemperatureInfo::from_wire(&empty).map_err(kind), Err(ErrorKind::MessageError));
        assert_eq!(LogInfo::from_wire(&empty).map_err(kind), Err(ErrorKind::MessageError));
    }
}
