//! Configuration of the replay buffer.
use crate::error::SteerError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration for prioritized experience replay.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PerConfig {
    /// Exponent applied to TD errors when they become priorities.
    /// `0` makes sampling uniform.
    pub alpha: f32,

    /// Lower bound of priorities. Keeps every stored transition reachable.
    pub eps: f32,

    /// Upper bound of priorities, also the priority of the first insertion.
    pub max_priority: f32,

    /// Initial value of the importance sampling exponent.
    pub beta_0: f32,

    /// Final value of the importance sampling exponent.
    pub beta_final: f32,

    /// Number of optimization steps after which `beta` reaches `beta_final`.
    pub n_opts_final: usize,
}

impl Default for PerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            eps: 0.01,
            max_priority: 2000.0,
            beta_0: 0.4,
            beta_final: 1.0,
            n_opts_final: 500_000,
        }
    }
}

impl PerConfig {
    /// Sets the prioritization exponent `alpha`.
    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the lower bound of priorities.
    pub fn eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    /// Sets the upper bound of priorities.
    pub fn max_priority(mut self, max_priority: f32) -> Self {
        self.max_priority = max_priority;
        self
    }

    /// Sets the initial importance sampling exponent.
    pub fn beta_0(mut self, beta_0: f32) -> Self {
        self.beta_0 = beta_0;
        self
    }

    /// Sets the final importance sampling exponent.
    pub fn beta_final(mut self, beta_final: f32) -> Self {
        self.beta_final = beta_final;
        self
    }

    /// Sets the number of optimization steps to reach the final beta value.
    pub fn n_opts_final(mut self, n_opts_final: usize) -> Self {
        self.n_opts_final = n_opts_final;
        self
    }

    fn validate(&self) -> Result<(), SteerError> {
        if !(self.eps > 0.0 && self.eps.is_finite()) {
            return Err(SteerError::InvalidConfig(format!(
                "per_config.eps must be positive, got {}",
                self.eps
            )));
        }
        if !(self.max_priority >= self.eps && self.max_priority.is_finite()) {
            return Err(SteerError::InvalidConfig(format!(
                "per_config.max_priority ({}) must be finite and >= eps ({})",
                self.max_priority, self.eps
            )));
        }
        Ok(())
    }
}

/// Configuration of [`PrioritizedReplayBuffer`](super::PrioritizedReplayBuffer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// Maximum number of transitions. The oldest ones are overwritten first.
    pub capacity: usize,

    /// Dimension of observations.
    pub obs_dim: usize,

    /// Number of discrete actions.
    pub n_actions: usize,

    /// Random seed used for sampling.
    pub seed: u64,

    /// Prioritized sampling if `Some`, uniform sampling otherwise.
    pub per_config: Option<PerConfig>,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10000,
            obs_dim: 21,
            n_actions: 5,
            seed: 42,
            per_config: None,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the dimension of observations.
    pub fn obs_dim(mut self, obs_dim: usize) -> Self {
        self.obs_dim = obs_dim;
        self
    }

    /// Sets the number of actions.
    pub fn n_actions(mut self, n_actions: usize) -> Self {
        self.n_actions = n_actions;
        self
    }

    /// Sets the random seed for sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the configuration for prioritized experience replay.
    pub fn per_config(mut self, per_config: Option<PerConfig>) -> Self {
        self.per_config = per_config;
        self
    }

    /// Checks the values.
    pub fn validate(&self) -> Result<(), SteerError> {
        if self.capacity == 0 {
            return Err(SteerError::InvalidConfig("capacity must be positive".into()));
        }
        if self.obs_dim == 0 || self.n_actions == 0 {
            return Err(SteerError::InvalidConfig(
                "obs_dim and n_actions must be positive".into(),
            ));
        }
        if let Some(per_config) = &self.per_config {
            per_config.validate()?;
        }
        Ok(())
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
