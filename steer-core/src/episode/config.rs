//! Configuration of [`EpisodeScheduler`](super::EpisodeScheduler).
use super::DistanceShaping;
use crate::error::SteerError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`EpisodeScheduler`](super::EpisodeScheduler).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpisodeConfig {
    /// An episode times out when its step count exceeds this value.
    pub max_steps: usize,

    /// Discount applied to rewards accumulated in the episode reward.
    pub discount: f32,

    /// A vehicle collides when its smallest normalized sensor reading is below this value.
    pub collision_threshold: f32,

    /// Normalized goal distance within which the goal counts as reached.
    pub goal_tolerance: f32,

    /// Largest normalized goal angle for which the goal counts as reached.
    pub heading_tolerance: f32,

    /// Reward of reaching the goal.
    pub goal_reward: f32,

    /// Reward of a collision.
    pub fail_reward: f32,

    /// Number of stacked frames in an observation.
    pub frame_count: usize,

    /// Reward shaping of non-terminal steps.
    pub shaping: DistanceShaping,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            max_steps: 200,
            discount: 0.995,
            collision_threshold: 0.1,
            goal_tolerance: 0.025,
            heading_tolerance: 1.0,
            goal_reward: 6000.0,
            fail_reward: -2000.0,
            frame_count: 1,
            shaping: DistanceShaping::default(),
        }
    }
}

impl EpisodeConfig {
    /// Sets the maximum number of steps in an episode.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the discount of the episode reward.
    pub fn discount(mut self, v: f32) -> Self {
        self.discount = v;
        self
    }

    /// Sets the collision threshold.
    pub fn collision_threshold(mut self, v: f32) -> Self {
        self.collision_threshold = v;
        self
    }

    /// Sets the goal distance tolerance.
    pub fn goal_tolerance(mut self, v: f32) -> Self {
        self.goal_tolerance = v;
        self
    }

    /// Sets the goal angle tolerance.
    pub fn heading_tolerance(mut self, v: f32) -> Self {
        self.heading_tolerance = v;
        self
    }

    /// Sets the reward of reaching the goal.
    pub fn goal_reward(mut self, v: f32) -> Self {
        self.goal_reward = v;
        self
    }

    /// Sets the reward of a collision.
    pub fn fail_reward(mut self, v: f32) -> Self {
        self.fail_reward = v;
        self
    }

    /// Sets the number of stacked frames.
    pub fn frame_count(mut self, v: usize) -> Self {
        self.frame_count = v;
        self
    }

    /// Sets the reward shaping.
    pub fn shaping(mut self, v: DistanceShaping) -> Self {
        self.shaping = v;
        self
    }

    /// Dimension of an observation for vehicles with `n_sensors` sensors.
    pub fn obs_dim(&self, n_sensors: usize) -> usize {
        self.frame_count * (n_sensors + 2)
    }

    /// Checks the values.
    pub fn validate(&self) -> Result<(), SteerError> {
        if self.frame_count == 0 {
            return Err(SteerError::InvalidConfig("frame_count must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.discount) {
            return Err(SteerError::InvalidConfig(format!(
                "discount must be in [0, 1], got {}",
                self.discount
            )));
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
