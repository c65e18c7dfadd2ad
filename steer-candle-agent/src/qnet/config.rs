//! Configuration of [`QNet`](super::QNet).
use crate::{opt::OptimizerConfig, Device};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Loss between predicted action values and targets.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum CriticLoss {
    /// Mean squared error.
    Mse,

    /// Smooth L1 loss.
    SmoothL1,
}

/// Configuration of [`QNet`](super::QNet).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct QNetConfig {
    /// Dimension of observations.
    pub in_dim: usize,

    /// Units of the hidden layers.
    pub units: Vec<usize>,

    /// Number of actions.
    pub out_dim: usize,

    /// Splits the output into state value and advantages if `true`.
    pub dueling: bool,

    /// Coefficient of the L2 penalty on all parameters. `0` disables it.
    pub l2: f64,

    /// Loss function.
    pub critic_loss: CriticLoss,

    /// Optimizer.
    pub opt_config: OptimizerConfig,

    /// Device.
    pub device: Device,
}

impl Default for QNetConfig {
    fn default() -> Self {
        Self {
            in_dim: 11,
            units: vec![80, 80, 40],
            out_dim: 5,
            dueling: true,
            l2: 0.0,
            critic_loss: CriticLoss::Mse,
            opt_config: OptimizerConfig::default(),
            device: Device::Cpu,
        }
    }
}

impl QNetConfig {
    /// Sets the dimension of observations.
    pub fn in_dim(mut self, v: usize) -> Self {
        self.in_dim = v;
        self
    }

    /// Sets the units of the hidden layers.
    pub fn units(mut self, v: Vec<usize>) -> Self {
        self.units = v;
        self
    }

    /// Sets the number of actions.
    pub fn out_dim(mut self, v: usize) -> Self {
        self.out_dim = v;
        self
    }

    /// Enables or disables the dueling head.
    pub fn dueling(mut self, v: bool) -> Self {
        self.dueling = v;
        self
    }

    /// Sets the coefficient of the L2 penalty.
    pub fn l2(mut self, v: f64) -> Self {
        self.l2 = v;
        self
    }

    /// Sets the loss function.
    pub fn critic_loss(mut self, v: CriticLoss) -> Self {
        self.critic_loss = v;
        self
    }

    /// Sets the optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Constructs [`QNetConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`QNetConfig`] to as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
