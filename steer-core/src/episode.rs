//! Episode lifecycle of many vehicles stepped in lockstep.
//!
//! Every tick, [`EpisodeScheduler`] classifies each vehicle with an ordered
//! [`RuleSet`], assigns its reward, and produces the transition to be stored
//! in the replay buffer. Terminated vehicles are reset in a batch at the end
//! of the tick, at which point their bookkeeping is returned as
//! [`FinishedEpisode`]s.
//!
//! ```text
//! Active --(collision | goal | timeout)--> Collided | GoalReached | TimedOut
//!        --(reset)--> Resetting --> Active
//! ```
mod config;
mod rules;
mod scheduler;
mod shaping;
pub use config::EpisodeConfig;
pub use rules::{Lifecycle, Outcome, Rule, RuleInput, RuleSet};
pub use scheduler::{AgentState, EpisodeScheduler, FinishedEpisode, Tick};
pub use shaping::{DistanceShaping, RewardShaper};
