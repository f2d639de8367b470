//! Distributional soft actor-critic (DSAC) implemented with
//! [candle](https://crates.io/crates/candle-core).
//!
//! [`dsac::Dsac`] implements [`ocrl_core::Algorithm`] and can be trained
//! with [`ocrl_core::SerialTrainer`].
pub mod dsac;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod util;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}

impl Device {
    /// Creates the candle device.
    pub fn build(&self) -> Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(n) => Ok(candle_core::Device::new_cuda(*n)?),
        }
    }
}
