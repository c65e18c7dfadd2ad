#![warn(missing_docs)]
//! Core of a multi-agent DQN trainer for simulated vehicles.
//!
//! Many vehicles are stepped in lockstep in a shared environment implementing
//! [`VehicleEnv`]. Every tick, [`Trainer`] selects actions with a [`Learner`],
//! lets [`EpisodeScheduler`](episode::EpisodeScheduler) classify each vehicle
//! and produce transitions, stores them in a
//! [`PrioritizedReplayBuffer`](replay_buffer::PrioritizedReplayBuffer) and
//! trains the learner on prioritized batches with double Q-learning targets.
pub mod episode;
pub mod error;
pub mod obs_window;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{
    steering_angle, AgentReading, ExperienceBufferBase, GoalInfo, Learner, ParamLayout,
    ReplayBufferBase, VehicleEnv,
};

mod trainer;
pub use trainer::{
    argmax, compute_targets, td_errors, EpsilonGreedy, ExplorerConfig, RunningStats, TickReport,
    Trainer, TrainerConfig, TrainingContext,
};
