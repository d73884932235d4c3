//! Software-device schema.
//!
//! The schema is sent verbatim with `system.device_connected`. It names the
//! device and lists every method it serves with its parameter and result
//! fields and the caller-side timeout in seconds.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use hippo_types::{ErrorKind, Facility, HippoError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema must describe exactly one device, found {0}")]
    DeviceCount(usize),

    #[error("schema device name is empty")]
    EmptyName,

    #[error("method '{0}' is declared twice")]
    DuplicateMethod(String),
}

impl SchemaError {
    #[must_use]
    pub fn into_error(self) -> HippoError {
        HippoError::new(Facility::SwDevice, ErrorKind::InvalidParam).with_message(self.to_string())
    }
}

/// One named, typed field of a method signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSpec {
    #[serde(default)]
    pub doc: Vec<String>,
    pub method: String,
    #[serde(default)]
    pub params: Vec<FieldSpec>,
    #[serde(default)]
    pub result: Vec<FieldSpec>,
    /// Seconds a caller should wait for the result
    pub timeout: u64,
}

impl MethodSpec {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSchema {
    pub device_name: String,
    pub api: Vec<MethodSpec>,
}

/// A validated schema, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    devices: Vec<DeviceSchema>,
}

impl Schema {
    /// Parse and validate schema JSON.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` for malformed JSON, a device count other than
    /// one, an empty device name, or a method declared twice.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let devices: Vec<DeviceSchema> = serde_json::from_str(json)?;
        Self::new(devices)
    }

    /// # Errors
    ///
    /// Same checks as [`Schema::from_json`].
    pub fn new(devices: Vec<DeviceSchema>) -> Result<Self, SchemaError> {
        let [device] = devices.as_slice() else {
            return Err(SchemaError::DeviceCount(devices.len()));
        };
        if device.device_name.is_empty() {
            return Err(SchemaError::EmptyName);
        }

        let mut seen = HashSet::new();
        if let Some(spec) = device.api.iter().find(|spec| !seen.insert(spec.method.as_str())) {
            return Err(SchemaError::DuplicateMethod(spec.method.clone()));
        }
        drop(seen);

        Ok(Self { devices })
    }

    fn device(&self) -> &DeviceSchema {
        // validated to hold exactly one entry
        &self.devices[0]
    }

    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device().device_name
    }

    #[must_use]
    pub fn methods(&self) -> &[MethodSpec] {
        &self.device().api
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodSpec> {
        self.methods().iter().find(|spec| spec.method == name)
    }

    /// The array sent as `system.device_connected` params.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.devices).unwrap_or(Value::Null)
    }
}

/// Method name to declared parameter count, built once per registration.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    arity: HashMap<String, usize>,
}

impl MethodTable {
    #[must_use]
    pub fn new(schema: &Schema) -> Self {
        Self {
            arity: schema
                .methods()
                .iter()
                .map(|spec| (spec.method.clone(), spec.params.len()))
                .collect(),
        }
    }

    /// Number of parameters `method` declares, or `None` if it is not served.
    #[must_use]
    pub fn arity(&self, method: &str) -> Option<usize> {
        self.arity.get(method).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.arity.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arity.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ECHO: &str = r#"[{
        "device_name": "echo",
        "api": [
            {"doc": ["say it back"], "method": "say",
             "params": [{"name": "s", "type": "string"}],
             "result": [{"name": "r", "type": "string"}],
             "timeout": 2},
            {"method": "reset", "params": [], "result": [], "timeout": 1}
        ]
    }]"#;

    #[test]
    fn test_parse() {
        let schema = Schema::from_json(ECHO).unwrap();
        assert_eq!(schema.device_name(), "echo");
        assert_eq!(schema.methods().len(), 2);

        let say = schema.method("say").unwrap();
        assert_eq!(say.params[0].ty, "string");
        assert_eq!(say.timeout(), Duration::from_secs(2));
        assert!(schema.method("reset").unwrap().doc.is_empty());
        assert!(schema.method("shout").is_none());
    }

    #[test]
    fn test_type_key_on_the_wire() {
        let schema = Schema::from_json(ECHO).unwrap();
        let value = schema.to_value();
        assert_eq!(value[0]["api"][0]["params"][0], json!({"name": "s", "type": "string"}));
        assert_eq!(value[0]["device_name"], json!("echo"));
    }

    #[test]
    fn test_rejects_bad_schemas() {
        assert!(matches!(Schema::from_json("{"), Err(SchemaError::Json(_))));
        assert!(matches!(Schema::from_json("[]"), Err(SchemaError::DeviceCount(0))));
        assert!(matches!(
            Schema::from_json(r#"[{"device_name": "", "api": []}]"#),
            Err(SchemaError::EmptyName)
        ));

        let twice = r#"[{"device_name": "d", "api": [
            {"method": "m", "timeout": 1},
            {"method": "m", "timeout": 1}
        ]}]"#;
        match Schema::from_json(twice) {
            Err(SchemaError::DuplicateMethod(name)) => assert_eq!(name, "m"),
            other => panic!("expected duplicate method error, got {other:?}"),
        }
    }

    #[test]
    fn test_schema_error_code() {
        let err = SchemaError::EmptyName.into_error();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidParam));
        assert_eq!(err.facility(), Some(Facility::SwDevice));
    }

    #[test]
    fn test_method_table() {
        let table = MethodTable::new(&Schema::from_json(ECHO).unwrap());
        assert_eq!(table.len(), 2);
        assert_eq!(table.arity("say"), Some(1));
        assert_eq!(table.arity("reset"), Some(0));
        assert_eq!(table.arity("shout"), None);
    }
}
