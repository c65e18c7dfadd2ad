//! Interfaces of the collaborators of the training loop.
mod env;
mod learner;
mod replay_buffer;
pub use env::{steering_angle, AgentReading, GoalInfo, VehicleEnv};
pub use learner::{Learner, ParamLayout};
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
