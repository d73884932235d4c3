//! JSON-RPC over WebSocket for the SoHal client SDK.
//!
//! This crate provides the protocol types, WebSocket transport, and client
//! used to reach the SoHal service.
//!
//! # Architecture
//!
//! - [`protocol`]: JSON-RPC 2.0 message types (Request, Response, Notification)
//! - [`transport`]: WebSocket connect/accept and frame encoding
//! - [`client`]: `RpcClient`, one connection with id-matched calls
//! - [`config`]: where SoHal lives and how long to wait for it
//! - [`error`]: transport errors and their hippo error kinds
//! - `testing` (feature `testing`): an in-process SoHal double
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use hippo_rpc::{ConnectionConfig, RpcClient};
//! use hippo_types::Facility;
//!
//! # async fn example() -> hippo_types::Result<()> {
//! let config = ConnectionConfig::default();
//! let (client, _incoming) = RpcClient::connect(&config, Facility::SoHal).await?;
//!
//! let version = client
//!     .call("sohal@0.version", None, Duration::from_secs(1))
//!     .await?;
//! println!("SoHal {version}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use client::{Inbound, Incoming, RpcClient};
pub use config::{ConfigError, ConnectionConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use error::TransportError;
pub use protocol::{JSONRPC_VERSION, Message, Notification, Request, RequestId, Response, RpcError};
pub use transport::{MAX_MESSAGE_SIZE, SUBPROTOCOL};
