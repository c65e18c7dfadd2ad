//! Q-network implemented with [candle](https://crates.io/crates/candle-core).
//!
//! [`QNet`] implements [`steer_core::Learner`] and can be plugged into
//! [`steer_core::Trainer`] as both the online and the target network.
pub mod opt;
mod qnet;
use anyhow::Result;
pub use qnet::{CriticLoss, Mlp, QNet, QNetConfig};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq, Default)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    #[default]
    Cpu,

    /// The GPU device with the given ordinal.
    Cuda(usize),
}

impl Device {
    /// Creates the corresponding candle device.
    pub fn to_candle(self) -> Result<candle_core::Device> {
        Ok(match self {
            Self::Cpu => candle_core::Device::Cpu,
            Self::Cuda(n) => candle_core::Device::new_cuda(n)?,
        })
    }
}
