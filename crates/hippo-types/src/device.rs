//! Payloads shared by every SoHal device.

use crate::wire::{Object, Value, Wire, WireError};
use crate::{wire_enum, wire_object};

/// Identity of a device as reported by `info`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub fw_version: String,
    pub name: String,
    pub serial: String,
    pub index: u32,
    pub vendor_id: u32,
    pub product_id: u32,
}

wire_object!(DeviceInfo {
    fw_version,
    name,
    serial,
    index,
    vendor_id,
    product_id,
});

wire_enum! {
    /// Temperature sensors that `temperatures` may report.
    pub enum TempSensor {
        Led => "led",
        Red => "red",
        Green => "green",
        Formatter => "formatter",
        Heatsink => "heatsink",
        HiResCamera => "hirescamera",
        DepthCamera => "depthcamera",
        DepthCameraTec => "depthcamera_tec",
        HiResCameraZ3d => "hirescamera_z_3d",
        HiResCameraZ3dSystem => "hirescamera_z_3d_system",
        DepthCameraZ3dTec => "depthcamera_z_3d_tec",
    }
}

wire_enum! {
    /// Device through which SoHal reads a temperature sensor.
    pub enum ConnectedDevice {
        DepthCamera => "depthcamera",
        Desklamp => "desklamp",
        HiResCamera => "hirescamera",
        Projector => "projector",
    }
}

/// `"<device>@<index>"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemperatureDevice {
    pub connected_device: ConnectedDevice,
    pub index: u32,
}

impl Wire for TemperatureDevice {
    fn to_wire(&self) -> Result<Value, WireError> {
        Ok(Value::String(format!(
            "{}@{}",
            self.connected_device.name(),
            self.index
        )))
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        let text = value.as_str().ok_or(WireError::Type { expected: "string" })?;
        let (device, index) = text
            .split_once('@')
            .ok_or_else(|| WireError::UnknownName(text.to_string()))?;
        let connected_device = ConnectedDevice::from_name(device)
            .ok_or_else(|| WireError::UnknownName(device.to_string()))?;
        let index = index
            .parse()
            .map_err(|_| WireError::OutOfRange("device index"))?;
        Ok(Self {
            connected_device,
            index,
        })
    }
}

/// One sensor reading, in degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureInfo {
    pub device: TemperatureDevice,
    pub current: f32,
    /// Over-temperature threshold; the firmware may cut functionality past it
    pub max: f32,
    /// Warning threshold, and the point below which over-temperature mode ends
    pub safe: f32,
    pub sensor: TempSensor,
}

impl Wire for TemperatureInfo {
    fn to_wire(&self) -> Result<Value, WireError> {
        let mut map = crate::wire::Map::new();
        map.insert("device".to_string(), self.device.to_wire()?);
        map.insert("current".to_string(), self.current.to_wire()?);
        map.insert("max".to_string(), self.max.to_wire()?);
        map.insert("safe".to_string(), self.safe.to_wire()?);
        map.insert("sensor_name".to_string(), self.sensor.to_wire()?);
        Ok(Value::Object(map))
    }

    fn from_wire(value: &Value) -> Result<Self, WireError> {
        let object = Object::new(value)?;
        Ok(Self {
            device: object.field("device")?,
            current: object.field("current")?,
            max: object.field("max")?,
            safe: object.field("safe")?,
            sensor: object.field("sensor_name")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_info_decode() {
        let value = json!({
            "fw_version": "1.2.3",
            "name": "touchmat",
            "serial": "SN123",
            "index": 0,
            "vendor_id": 1008,
            "product_id": 2349
        });
        let info = DeviceInfo::from_wire(&value).unwrap();
        assert_eq!(info.fw_version, "1.2.3");
        assert_eq!(info.vendor_id, 1008);
        assert_eq!(info.to_wire().unwrap(), value);
    }

    #[test]
    fn test_device_info_missing_key() {
        let value = json!({"fw_version": "1", "name": "x", "serial": "s", "index": 0, "vendor_id": 1});
        assert_eq!(
            DeviceInfo::from_wire(&value),
            Err(WireError::MissingKey("product_id"))
        );
    }

    #[test]
    fn test_temperature_info_decode() {
        let value = json!({
            "device": "projector@1",
            "current": 41.5,
            "max": 80.0,
            "safe": 70.0,
            "sensor_name": "hirescamera"
        });
        let info = TemperatureInfo::from_wire(&value).unwrap();
        assert_eq!(info.device.connected_device, ConnectedDevice::Projector);
        assert_eq!(info.device.index, 1);
        assert_eq!(info.sensor, TempSensor::HiResCamera);
        assert_eq!(info.to_wire().unwrap(), value);
    }

    #[test]
    fn test_temperature_info_bad_device() {
        let mut value = json!({
            "device": "projector",
            "current": 41.5,
            "max": 80.0,
            "safe": 70.0,
            "sensor_name": "led"
        });
        assert!(TemperatureInfo::from_wire(&value).is_err());

        value["device"] = json!("toaster@0");
        assert!(TemperatureInfo::from_wire(&value).is_err());

        value["device"] = json!("desklamp@x");
        assert!(TemperatureInfo::from_wire(&value).is_err());
    }

    #[test]
    fn test_temperature_info_integer_temperature() {
        let value = json!({
            "device": "desklamp@0",
            "current": 41,
            "max": 80.0,
            "safe": 70.0,
            "sensor_name": "led"
        });
        assert_eq!(
            TemperatureInfo::from_wire(&value),
            Err(WireError::Type { expected: "float" })
        );
    }

    #[test]
    fn test_sensor_unknown_name() {
        assert_eq!(
            TempSensor::from_wire(&json!("blue")),
            Err(WireError::UnknownName("blue".to_string()))
        );
        assert_eq!(TempSensor::from_name("depthcamera_z_3d_tec"), Some(TempSensor::DepthCameraZ3dTec));
    }
}
