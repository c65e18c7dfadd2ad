//! Batch of transitions.
use ndarray::Array2;

/// A batch of transitions sampled from [`PrioritizedReplayBuffer`](super::PrioritizedReplayBuffer).
#[derive(Clone, Debug)]
pub struct TransitionBatch {
    /// Observations, `(batch_size, obs_dim)`.
    pub obs: Array2<f32>,

    /// Actions.
    pub act: Vec<usize>,

    /// Next observations, `(batch_size, obs_dim)`.
    pub next_obs: Array2<f32>,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Done flags.
    pub is_done: Vec<i8>,

    /// Slot indices of the samples, used for priority updates.
    pub ix_sample: Vec<usize>,

    /// Importance sampling weights. All ones without prioritization.
    pub weight: Vec<f32>,
}

impl TransitionBatch {
    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }
}
