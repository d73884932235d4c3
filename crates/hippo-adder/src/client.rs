//! Typed client for the adder device.

use std::ops::Deref;
use std::time::Duration;

use hippo_device::SwDeviceClient;
use hippo_rpc::ConnectionConfig;
use hippo_swdevice::{MethodSpec, Schema};
use hippo_types::{B64Bytes, Facility, Params, Result, WideString, Wire, WireError};

use crate::service::schema;
use crate::types::{CameraKeystoneX, DataWithB64Bytes, DataWithWcharptr, PointX};
use crate::DEVICE_NAME;

/// Handle for `adder@<index>`.
///
/// Each call waits as long as the schema allows for that method.
#[derive(Debug)]
pub struct Adder {
    client: SwDeviceClient,
    schema: Schema,
}

impl Adder {
    /// # Errors
    ///
    /// Returns `InvalidParam` if the embedded schema is invalid.
    pub fn new(index: u32) -> Result<Self> {
        Self::with_config(ConnectionConfig::default(), index)
    }

    /// # Errors
    ///
    /// Returns `InvalidParam` if the embedded schema is invalid.
    pub fn with_config(config: ConnectionConfig, index: u32) -> Result<Self> {
        Ok(Self {
            client: SwDeviceClient::new(config, DEVICE_NAME, index),
            schema: schema()?,
        })
    }

    /// Timeout the schema declares for `method`, or the configured request
    /// timeout for methods it does not list.
    #[must_use]
    pub fn timeout(&self, method: &str) -> Duration {
        self.schema
            .method(method)
            .map_or_else(|| self.client.config().request_timeout(), MethodSpec::timeout)
    }

    async fn invoke<T: Wire>(&self, method: &str, params: std::result::Result<Params, WireError>) -> Result<T> {
        let params = params.map_err(|e| e.into_error(Facility::SwDevice))?;
        self.client.call(method, params, self.timeout(method)).await
    }

    /// # Errors
    ///
    /// Returns connection errors, the device's error, or `MessageError` if
    /// the reply does not decode.
    pub async fn add_point(&self, p1: &PointX, p2: &PointX) -> Result<PointX> {
        self.invoke("add_point", Params::new().with(p1).and_then(|p| p.with(p2)))
            .await
    }

    /// # Errors
    ///
    /// Same as [`Adder::add_point`].
    pub async fn keystone(&self, k: &CameraKeystoneX) -> Result<CameraKeystoneX> {
        self.invoke("keystone", Params::new().with(k)).await
    }

    /// # Errors
    ///
    /// Same as [`Adder::add_point`].
    pub async fn version(&self) -> Result<WideString> {
        self.invoke("version", Ok(Params::new())).await
    }

    /// Ask the device to unregister.
    ///
    /// # Errors
    ///
    /// Same as [`Adder::add_point`].
    pub async fn disconnect_device(&self) -> Result<()> {
        self.invoke("disconnect_device", Ok(Params::new())).await
    }

    /// # Errors
    ///
    /// Same as [`Adder::add_point`].
    pub async fn binary_data(&self, b1: &B64Bytes, b2: &B64Bytes) -> Result<B64Bytes> {
        self.invoke("binary_data", Params::new().with(b1).and_then(|p| p.with(b2)))
            .await
    }

    /// Always fails on a well-behaved device.
    ///
    /// # Errors
    ///
    /// Returns whatever error the device raises.
    pub async fn return_error(&self) -> Result<()> {
        self.invoke("return_error", Ok(Params::new())).await
    }

    /// # Errors
    ///
    /// Same as [`Adder::add_point`].
    pub async fn slow_call(&self, f1: i32) -> Result<i32> {
        self.invoke("slow_call", Params::new().with(&f1)).await
    }

    /// # Errors
    ///
    /// Same as [`Adder::add_point`].
    pub async fn hidden_array(
        &self,
        data_b64: &DataWithB64Bytes,
        data_wcharptr: &DataWithWcharptr,
    ) -> Result<DataWithB64Bytes> {
        self.invoke(
            "hidden_array",
            Params::new().with(data_b64).and_then(|p| p.with(data_wcharptr)),
        )
        .await
    }
}

impl Deref for Adder {
    type Target = SwDeviceClient;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}
