//! Prioritized experience replay.
//!
//! [`PrioritizedReplayBuffer`] is a fixed-capacity circular buffer of
//! [`Transition`]s. When [`PerConfig`] is given, every slot carries a priority
//! kept in a sum tree, so that insertion, priority update and sampling
//! proportional to priority all take `O(log capacity)` time. Without it, the
//! buffer samples uniformly.
//!
//! ```rust
//! use steer_core::{
//!     replay_buffer::{PerConfig, PrioritizedReplayBuffer, ReplayBufferConfig, Transition},
//!     ReplayBufferBase,
//! };
//!
//! let config = ReplayBufferConfig::default()
//!     .capacity(4)
//!     .obs_dim(2)
//!     .n_actions(3)
//!     .per_config(Some(PerConfig::default()));
//! let mut buffer = PrioritizedReplayBuffer::build(&config).unwrap();
//!
//! for i in 0..4 {
//!     let tr = Transition::new(vec![0.0, 1.0], i % 3, 1.0, vec![1.0, 1.0], 0);
//!     buffer.insert(tr, Some((i + 1) as f32)).unwrap();
//! }
//! let batch = buffer.batch(2).unwrap();
//! assert_eq!(batch.len(), 2);
//! ```
mod base;
mod batch;
mod config;
mod transition;
pub use base::{IwScheduler, PrioritizedReplayBuffer, SumTree};
pub use batch::TransitionBatch;
pub use config::{PerConfig, ReplayBufferConfig};
pub use transition::Transition;
