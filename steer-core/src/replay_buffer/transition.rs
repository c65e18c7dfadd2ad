//! Transition.

/// A single transition `(o_t, a_t, r_t, o_t+1, done_t)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// Observation before the action.
    pub obs: Vec<f32>,

    /// Index of the action taken.
    pub act: usize,

    /// Reward.
    pub reward: f32,

    /// Observation after the action.
    pub next_obs: Vec<f32>,

    /// `1` if the episode ended with this transition, `0` otherwise.
    pub is_done: i8,
}

impl Transition {
    /// Constructs a transition.
    pub fn new(obs: Vec<f32>, act: usize, reward: f32, next_obs: Vec<f32>, is_done: i8) -> Self {
        Self {
            obs,
            act,
            reward,
            next_obs,
            is_done,
        }
    }
}
