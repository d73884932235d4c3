//! A working adder: sums points and buffers, echoes keystones.

use std::time::Duration;

use hippo_swdevice::Notifier;
use hippo_types::{B64Bytes, ErrorKind, Facility, HippoError, Result, WideString};
use tracing::{debug, info};

use crate::service::AdderHandler;
use crate::types::{CameraKeystoneX, DataWithB64Bytes, DataWithWcharptr, PointX};

pub const VERSION: &str = "你好, I don't know my version but here is a \u{1f412} with a \u{1f34c}";

fn error(kind: ErrorKind, message: &str) -> HippoError {
    HippoError::new(Facility::SwDevice, kind).with_message(message)
}

/// The reference adder implementation.
///
/// `slow_call` counts down `steps` ticks of `tick` each, pushing
/// `on_progress` with the ticks left before every one.
#[derive(Debug, Clone)]
pub struct SummingAdder {
    steps: i32,
    tick: Duration,
}

impl Default for SummingAdder {
    fn default() -> Self {
        Self {
            steps: 15,
            tick: Duration::from_secs(1),
        }
    }
}

impl SummingAdder {
    #[must_use]
    pub fn with_slow_call(steps: i32, tick: Duration) -> Self {
        Self { steps, tick }
    }
}

impl AdderHandler for SummingAdder {
    async fn add_point(&self, p1: PointX, p2: PointX, _notifier: &Notifier) -> Result<PointX> {
        debug!("add_point {p1:?} + {p2:?}");
        let overflow = || error(ErrorKind::ParamOutOfRange, "point sum overflows");
        Ok(PointX {
            x: p1.x.checked_add(p2.x).ok_or_else(overflow)?,
            y: p1.y.checked_add(p2.y).ok_or_else(overflow)?,
        })
    }

    async fn keystone(&self, k: CameraKeystoneX, _notifier: &Notifier) -> Result<CameraKeystoneX> {
        Ok(k)
    }

    async fn version(&self, _notifier: &Notifier) -> Result<WideString> {
        Ok(WideString::from(VERSION))
    }

    async fn binary_data(&self, b1: B64Bytes, b2: B64Bytes, _notifier: &Notifier) -> Result<B64Bytes> {
        if b1.len() != b2.len() {
            return Err(error(ErrorKind::InvalidParam, "buffers differ in length"));
        }
        Ok(b1.iter().zip(b2.iter()).map(|(a, b)| a.wrapping_add(*b)).collect::<Vec<u8>>().into())
    }

    async fn return_error(&self, _notifier: &Notifier) -> Result<()> {
        Err(HippoError::new(Facility::SwDevice, ErrorKind::Error))
    }

    async fn slow_call(&self, f1: i32, notifier: &Notifier) -> Result<i32> {
        for left in (1..=self.steps).rev() {
            debug!("slow_call: {left} left");
            notifier.notify("progress", Some(&left)).await?;
            tokio::time::sleep(self.tick).await;
        }
        info!("slow_call finished");
        Ok(f1)
    }

    async fn hidden_array(
        &self,
        data_b64: DataWithB64Bytes,
        data_wcharptr: DataWithWcharptr,
        _notifier: &Notifier,
    ) -> Result<DataWithB64Bytes> {
        let count = usize::try_from(data_b64.counter)
            .ok()
            .filter(|n| *n <= data_b64.hidden_b64bytes.len() && *n <= data_wcharptr.hidden_wcharptr.len())
            .ok_or_else(|| error(ErrorKind::InvalidParam, "counter exceeds the buffers"))?;

        let summed: Vec<u8> = data_b64.hidden_b64bytes[..count]
            .iter()
            .zip(data_wcharptr.hidden_wcharptr.units())
            .map(|(byte, unit)| byte.wrapping_add(unit.to_le_bytes()[0]))
            .collect();
        Ok(DataWithB64Bytes {
            counter: data_b64.counter,
            hidden_b64bytes: summed.into(),
        })
    }
}
