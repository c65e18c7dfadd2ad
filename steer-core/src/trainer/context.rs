//! Mutable state of a training run.

/// Counters shared by the phases of a tick.
///
/// Owned by [`Trainer`](super::Trainer) and passed through the tick loop.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingContext {
    /// Sum of vehicle steps so far; grows by the number of vehicles every tick.
    pub global_step: usize,

    /// Current exploration rate.
    pub epsilon: f32,

    /// Finished episodes. Held at zero until the warm-up is over.
    pub episodes: usize,

    /// Global step of the last target network sync.
    pub last_sync_step: usize,

    /// Transitions inserted into the replay buffer.
    pub total_inserted: usize,

    /// Optimization steps.
    pub n_opts: usize,

    /// Episode count at the last checkpoint.
    pub last_saved_episode: usize,
}

impl TrainingContext {
    /// Creates a context at the start of training.
    pub fn new(epsilon: f32) -> Self {
        Self {
            global_step: 0,
            epsilon,
            episodes: 0,
            last_sync_step: 0,
            total_inserted: 0,
            n_opts: 0,
            last_saved_episode: 0,
        }
    }

    /// Returns `true` once enough transitions were inserted to start training.
    pub fn is_warm(&self, warmup: usize) -> bool {
        self.total_inserted >= warmup
    }
}
