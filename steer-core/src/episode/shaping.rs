//! Reward shaping for non-terminal steps.
use crate::AgentReading;
use serde::{Deserialize, Serialize};

/// Computes the reward of a step that did not end in a collision or at the goal.
pub trait RewardShaper {
    /// Returns the shaped reward.
    ///
    /// `prev_goal_distance` is the goal distance observed on the previous tick.
    fn reward(&self, prev_goal_distance: f32, reading: &AgentReading, action: usize) -> f32;
}

/// Rewards progress towards the goal and penalizes closeness to obstacles.
///
/// ```text
/// r = dist_mul * (prev_goal_distance - goal_distance)
///     - 1 / max(min_sensor + min_sensor_const, sensor_floor)
///     - steer_penalty * |action - center_action|
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DistanceShaping {
    /// Scale of the progress term.
    pub dist_mul: f32,

    /// Offset added to the smallest sensor reading.
    pub min_sensor_const: f32,

    /// Lower bound of the obstacle term's denominator.
    pub sensor_floor: f32,

    /// Scale of the steering term. `0` disables it.
    pub steer_penalty: f32,

    /// Action index of driving straight.
    pub center_action: f32,
}

impl Default for DistanceShaping {
    fn default() -> Self {
        Self {
            dist_mul: 20.0,
            min_sensor_const: -0.075,
            sensor_floor: 0.01,
            steer_penalty: 0.0,
            center_action: 2.0,
        }
    }
}

impl DistanceShaping {
    /// Sets the scale of the progress term.
    pub fn dist_mul(mut self, v: f32) -> Self {
        self.dist_mul = v;
        self
    }

    /// Sets the offset of the smallest sensor reading.
    pub fn min_sensor_const(mut self, v: f32) -> Self {
        self.min_sensor_const = v;
        self
    }

    /// Sets the lower bound of the obstacle term's denominator.
    pub fn sensor_floor(mut self, v: f32) -> Self {
        self.sensor_floor = v;
        self
    }

    /// Sets the scale of the steering term.
    pub fn steer_penalty(mut self, v: f32) -> Self {
        self.steer_penalty = v;
        self
    }

    /// Sets the action index of driving straight.
    pub fn center_action(mut self, v: f32) -> Self {
        self.center_action = v;
        self
    }
}

impl RewardShaper for DistanceShaping {
    fn reward(&self, prev_goal_distance: f32, reading: &AgentReading, action: usize) -> f32 {
        let progress = self.dist_mul * (prev_goal_distance - reading.goal.distance);
        let clearance = (reading.min_sensor() + self.min_sensor_const).max(self.sensor_floor);
        let steer = self.steer_penalty * (action as f32 - self.center_action).abs();
        progress - 1.0 / clearance - steer
    }
}
