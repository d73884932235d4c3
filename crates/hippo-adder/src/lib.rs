//! The `adder` example software device.
//!
//! Both sides live here: [`AdderService`] serves an [`AdderHandler`] through
//! a [`hippo_swdevice::Bridge`], and [`Adder`] calls the device from any
//! other client.
//!
//! ```no_run
//! use hippo_adder::{Adder, PointX};
//!
//! # async fn example() -> hippo_types::Result<()> {
//! let adder = Adder::new(0)?;
//! let sum = adder
//!     .add_point(&PointX { x: 1, y: 2 }, &PointX { x: 3, y: 4 })
//!     .await?;
//! assert_eq!(sum, PointX { x: 4, y: 6 });
//! # Ok(())
//! # }
//! ```

mod client;
mod service;
pub mod summing;
pub mod types;

pub use client::Adder;
pub use service::{AdderHandler, AdderService, SCHEMA_JSON, schema};
pub use types::{CameraKeystoneX, CameraQuadrilateralX, DataWithB64Bytes, DataWithWcharptr, PointX};

pub const DEVICE_NAME: &str = "adder";
