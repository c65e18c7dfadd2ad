//! Environment.
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Goal information seen from a vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct GoalInfo {
    /// Angle to the goal relative to the vehicle heading, normalized.
    pub angle: f32,

    /// Distance to the goal, normalized.
    pub distance: f32,
}

/// Raw readings of a single vehicle after an environment step or reset.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentReading {
    /// Position of the vehicle in the world frame.
    pub position: [f32; 2],

    /// Heading of the vehicle in radians.
    pub heading: f32,

    /// Range sensor readings, normalized by the sensor range.
    pub sensors: Vec<f32>,

    /// Relative goal.
    pub goal: GoalInfo,
}

impl AgentReading {
    /// Returns the smallest sensor reading, or `f32::INFINITY` without sensors.
    pub fn min_sensor(&self) -> f32 {
        self.sensors.iter().fold(f32::INFINITY, |m, &v| m.min(v))
    }

    /// Returns the observation frame: sensor readings followed by the goal
    /// angle and distance.
    pub fn frame(&self) -> Vec<f32> {
        let mut frame = Vec::with_capacity(self.sensors.len() + 2);
        frame.extend_from_slice(&self.sensors);
        frame.push(self.goal.angle);
        frame.push(self.goal.distance);
        frame
    }
}

/// A simulator stepping many vehicles in lockstep.
///
/// Implementations must be deterministic given their seed. Errors are not
/// retried by the trainer; they abort the training run.
pub trait VehicleEnv {
    /// Number of vehicles in the environment.
    fn n_agents(&self) -> usize;

    /// Number of range sensors per vehicle.
    fn n_sensors(&self) -> usize;

    /// Applies one action index per vehicle and advances the simulation by one tick.
    ///
    /// Returns one reading per vehicle, in vehicle order.
    fn step(&mut self, actions: &[usize]) -> Result<Vec<AgentReading>>;

    /// Re-spawns the given vehicles.
    ///
    /// Returns one fresh reading per requested vehicle, in the order of `agents`.
    fn reset(&mut self, agents: &[usize]) -> Result<Vec<AgentReading>>;
}

/// Maps a discrete action index to a steering angle.
///
/// Index 0 is a full left turn (`max_steer`), the last index a full right turn
/// (`-max_steer`).
pub fn steering_angle(action: usize, n_actions: usize, max_steer: f32) -> f32 {
    if n_actions < 2 {
        return 0.0;
    }
    max_steer - action as f32 * 2.0 * max_steer / (n_actions - 1) as f32
}
