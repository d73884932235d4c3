//! Device proxies for the SoHal client SDK.
//!
//! [`Device`] is the generic handle: lazy connection, common operations,
//! typed get/set helpers and a single notification subscriber. [`TouchMat`],
//! [`SoHal`] and [`SwDeviceClient`] wrap it with device-specific methods.
//!
//! ```no_run
//! use hippo_device::TouchMat;
//! use hippo_types::TouchMatNotification;
//!
//! # async fn example() -> hippo_types::Result<()> {
//! let touchmat = TouchMat::new(0);
//! touchmat.open().await?;
//! touchmat
//!     .subscribe(|event: &TouchMatNotification| println!("{event:?}"))
//!     .await?;
//! println!("{:?}", touchmat.state().await?);
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod sohal;
mod subscriber;
pub mod swdevice;
pub mod touchmat;

pub use device::Device;
pub use sohal::SoHal;
pub use subscriber::Callback;
pub use swdevice::SwDeviceClient;
pub use touchmat::TouchMat;

pub use hippo_rpc::ConnectionConfig;
pub use hippo_types::{HippoError, Result};
