//! Server side of the adder device.
//!
//! [`AdderHandler`] holds one method per schema entry. Every method fails
//! with `FuncNotAvailable` unless overridden, except `disconnect_device`
//! which succeeds because the bridge raises the disconnect flag itself.
//! [`AdderService`] decodes parameters, calls the handler and encodes the
//! result.

use std::future::Future;

use hippo_swdevice::{Notifier, Schema, SwDevice};
use hippo_types::{
    B64Bytes, ErrorKind, Facility, HippoError, Params, Result, WideString, Wire,
};
use serde_json::Value;

use crate::types::{CameraKeystoneX, DataWithB64Bytes, DataWithWcharptr, PointX};

/// The schema registered with SoHal.
pub const SCHEMA_JSON: &str = include_str!("../adder.json");

/// Parse the embedded schema.
///
/// # Errors
///
/// Returns `InvalidParam` if the embedded JSON is not a valid schema.
pub fn schema() -> Result<Schema> {
    Schema::from_json(SCHEMA_JSON).map_err(hippo_swdevice::SchemaError::into_error)
}

fn not_available() -> HippoError {
    HippoError::new(Facility::SwDevice, ErrorKind::FuncNotAvailable)
}

/// Behaviour of an adder device. Override the methods you serve.
pub trait AdderHandler: Send + Sync + 'static {
    fn add_point(
        &self,
        _p1: PointX,
        _p2: PointX,
        _notifier: &Notifier,
    ) -> impl Future<Output = Result<PointX>> + Send {
        async { Err(not_available()) }
    }

    fn keystone(
        &self,
        _k: CameraKeystoneX,
        _notifier: &Notifier,
    ) -> impl Future<Output = Result<CameraKeystoneX>> + Send {
        async { Err(not_available()) }
    }

    fn version(&self, _notifier: &Notifier) -> impl Future<Output = Result<WideString>> + Send {
        async { Err(not_available()) }
    }

    /// Called before the disconnect flag is raised.
    fn disconnect_device(&self, _notifier: &Notifier) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    fn binary_data(
        &self,
        _b1: B64Bytes,
        _b2: B64Bytes,
        _notifier: &Notifier,
    ) -> impl Future<Output = Result<B64Bytes>> + Send {
        async { Err(not_available()) }
    }

    fn return_error(&self, _notifier: &Notifier) -> impl Future<Output = Result<()>> + Send {
        async { Err(not_available()) }
    }

    fn slow_call(&self, _f1: i32, _notifier: &Notifier) -> impl Future<Output = Result<i32>> + Send {
        async { Err(not_available()) }
    }

    fn hidden_array(
        &self,
        _data_b64: DataWithB64Bytes,
        _data_wcharptr: DataWithWcharptr,
        _notifier: &Notifier,
    ) -> impl Future<Output = Result<DataWithB64Bytes>> + Send {
        async { Err(not_available()) }
    }
}

/// Serves an [`AdderHandler`] through a [`hippo_swdevice::Bridge`].
#[derive(Debug)]
pub struct AdderService<H> {
    handler: H,
    schema: Schema,
}

impl<H: AdderHandler> AdderService<H> {
    /// # Errors
    ///
    /// Returns `InvalidParam` if the embedded schema is invalid.
    pub fn new(handler: H) -> Result<Self> {
        Ok(Self {
            handler,
            schema: schema()?,
        })
    }

    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }
}

fn arg<T: Wire>(params: &Params, index: usize) -> Result<T> {
    params
        .get(index)
        .map_err(|e| e.into_error(Facility::SwDevice))
}

fn encode<T: Wire>(result: Result<T>) -> Result<Value> {
    result?
        .to_wire()
        .map_err(|e| e.into_error(Facility::SwDevice))
}

impl<H: AdderHandler> SwDevice for AdderService<H> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn dispatch(&self, method: &str, params: Params, notifier: &Notifier) -> Result<Value> {
        let handler = &self.handler;
        match method {
            "add_point" => {
                let (p1, p2) = (arg(&params, 0)?, arg(&params, 1)?);
                encode(handler.add_point(p1, p2, notifier).await)
            }
            "keystone" => encode(handler.keystone(arg(&params, 0)?, notifier).await),
            "version" => encode(handler.version(notifier).await),
            "disconnect_device" => encode(handler.disconnect_device(notifier).await),
            "binary_data" => {
                let (b1, b2) = (arg(&params, 0)?, arg(&params, 1)?);
                encode(handler.binary_data(b1, b2, notifier).await)
            }
            "return_error" => encode(handler.return_error(notifier).await),
            "slow_call" => encode(handler.slow_call(arg(&params, 0)?, notifier).await),
            "hidden_array" => {
                let (data_b64, data_wcharptr) = (arg(&params, 0)?, arg(&params, 1)?);
                encode(handler.hidden_array(data_b64, data_wcharptr, notifier).await)
            }
            _ => Err(not_available()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_schema() {
        let schema = schema().unwrap();
        assert_eq!(schema.device_name(), "adder");
        assert_eq!(schema.methods().len(), 8);

        let timeouts: Vec<(&str, u64)> = schema
            .methods()
            .iter()
            .map(|spec| (spec.method.as_str(), spec.timeout))
            .collect();
        assert_eq!(
            timeouts,
            [
                ("add_point", 1),
                ("keystone", 1),
                ("version", 1),
                ("disconnect_device", 1),
                ("binary_data", 10),
                ("return_error", 2),
                ("slow_call", 30),
                ("hidden_array", 1),
            ]
        );
        assert_eq!(schema.method("hidden_array").unwrap().params[1].ty, "DataWithWcharptr");
    }

    #[test]
    fn test_param_errors_are_invalid_param() {
        let params = Params::from_value(Some(serde_json::json!([{"x": 1}])));
        let err = arg::<PointX>(&params, 0).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidParam));
        let err = arg::<PointX>(&params, 1).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidParam));
        assert_eq!(err.facility(), Some(Facility::SwDevice));
    }

    #[test]
    fn test_encode_passes_handler_error_through() {
        let err = HippoError::new(Facility::SwDevice, ErrorKind::Error);
        assert_eq!(encode::<i32>(Err(err.clone())), Err(err));
        assert_eq!(encode(Ok(PointX { x: 1, y: 2 })).unwrap()["y"], 2);
        assert_eq!(encode(Ok(())).unwrap(), Value::Null);
    }
}
