//! Configuration of [`Trainer`](super::Trainer).
use super::ExplorerConfig;
use crate::error::SteerError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// Training stops once more episodes than this have finished.
    pub max_episodes: usize,

    /// Number of transitions in a batch.
    pub batch_size: usize,

    /// Discount factor of the bootstrapped targets.
    pub gamma: f32,

    /// Uses double Q-learning targets if `true`.
    pub double_dqn: bool,

    /// Number of inserted transitions before optimization starts.
    pub warmup: usize,

    /// Interval of target network sync in global steps.
    pub sync_interval: usize,

    /// Where to save the online network. Nothing is saved if `None`.
    pub model_dir: Option<String>,

    /// Interval of saving the online network in finished episodes.
    pub save_interval: usize,

    /// Interval of flushing records in global steps.
    pub flush_record_interval: usize,

    /// Number of latest episodes in the running statistics.
    pub running_avg_window: usize,

    /// Exploration.
    pub explorer: ExplorerConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_episodes: 10000,
            batch_size: 32,
            gamma: 0.995,
            double_dqn: true,
            warmup: 10000,
            sync_interval: 3000,
            model_dir: None,
            save_interval: 500,
            flush_record_interval: 600,
            running_avg_window: 100,
            explorer: ExplorerConfig::default(),
        }
    }
}

impl TrainerConfig {
    /// Sets the maximum number of episodes.
    pub fn max_episodes(mut self, v: usize) -> Self {
        self.max_episodes = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    /// Enables or disables double Q-learning.
    pub fn double_dqn(mut self, v: bool) -> Self {
        self.double_dqn = v;
        self
    }

    /// Sets the warm-up period in inserted transitions.
    pub fn warmup(mut self, v: usize) -> Self {
        self.warmup = v;
        self
    }

    /// Sets the interval of target network sync in global steps.
    pub fn sync_interval(mut self, v: usize) -> Self {
        self.sync_interval = v;
        self
    }

    /// Sets the directory where the online network is saved.
    pub fn model_dir(mut self, v: impl Into<String>) -> Self {
        self.model_dir = Some(v.into());
        self
    }

    /// Sets the interval of saving in finished episodes.
    pub fn save_interval(mut self, v: usize) -> Self {
        self.save_interval = v;
        self
    }

    /// Sets the interval of flushing records in global steps.
    pub fn flush_record_interval(mut self, v: usize) -> Self {
        self.flush_record_interval = v;
        self
    }

    /// Sets the number of episodes in the running statistics.
    pub fn running_avg_window(mut self, v: usize) -> Self {
        self.running_avg_window = v;
        self
    }

    /// Sets the exploration configuration.
    pub fn explorer(mut self, v: ExplorerConfig) -> Self {
        self.explorer = v;
        self
    }

    /// Checks the values against the number of vehicles.
    ///
    /// The global step grows by `n_agents` every tick, so the intervals
    /// counted in global steps must be multiples of `n_agents` to ever be hit.
    pub fn validate(&self, n_agents: usize) -> Result<(), SteerError> {
        let err = |msg: String| Err(SteerError::InvalidConfig(msg));

        if n_agents == 0 {
            return err("the environment has no vehicles".into());
        }
        for (name, v) in [
            ("sync_interval", self.sync_interval),
            ("explorer.anneal_interval", self.explorer.anneal_interval),
            ("flush_record_interval", self.flush_record_interval),
        ] {
            if v == 0 || v % n_agents != 0 {
                return err(format!(
                    "{} ({}) must be a positive multiple of the number of vehicles ({})",
                    name, v, n_agents
                ));
            }
        }
        if self.batch_size == 0 {
            return err("batch_size must be positive".into());
        }
        if self.warmup < self.batch_size {
            return err(format!(
                "warmup ({}) must not be smaller than batch_size ({})",
                self.warmup, self.batch_size
            ));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return err(format!("gamma must be in [0, 1], got {}", self.gamma));
        }
        if self.model_dir.is_some() && self.save_interval == 0 {
            return err("save_interval must be positive".into());
        }
        let e = &self.explorer;
        if !(0.0 <= e.eps_final && e.eps_final <= e.eps_init && e.eps_init <= 1.0) {
            return err(format!(
                "epsilon must satisfy 0 <= eps_final ({}) <= eps_init ({}) <= 1",
                e.eps_final, e.eps_init
            ));
        }
        if !(0.0..=1.0).contains(&e.eps_decay) {
            return err(format!("eps_decay must be in [0, 1], got {}", e.eps_decay));
        }
        Ok(())
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
