//! Software devices for SoHal.
//!
//! A software device is a process that registers itself with SoHal and
//! then serves calls from other clients exactly like a hardware device.
//! Implement [`SwDevice`] and hand it to a [`Bridge`]:
//!
//! ```no_run
//! # use hippo_swdevice::{Bridge, Notifier, Schema, SwDevice};
//! # use hippo_types::{Params, Result};
//! # use serde_json::Value;
//! struct Clock {
//!     schema: Schema,
//! }
//!
//! impl SwDevice for Clock {
//!     fn schema(&self) -> &Schema {
//!         &self.schema
//!     }
//!
//!     async fn dispatch(&self, _method: &str, _params: Params, _notifier: &Notifier) -> Result<Value> {
//!         Ok(Value::from(42))
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! let schema = Schema::from_json(r#"[{"device_name": "clock", "api": [
//!     {"method": "now", "params": [], "result": [{"name": "t", "type": "integer"}], "timeout": 1}
//! ]}]"#).map_err(|e| e.into_error())?;
//!
//! let bridge = Bridge::new(hippo_rpc::ConnectionConfig::default(), Clock { schema });
//! bridge.connect_device().await?;
//! bridge.wait_for_disconnect().await;
//! bridge.disconnect_device().await
//! # }
//! ```

pub mod bridge;
pub mod schema;

pub use bridge::{Bridge, BridgeState, DEVICE_CONNECTED, DISCONNECT_DEVICE, Notifier, SwDevice};
pub use hippo_types::{HippoError, Result};
pub use schema::{DeviceSchema, FieldSpec, MethodSpec, MethodTable, Schema, SchemaError};
