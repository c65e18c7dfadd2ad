//! Running statistics of finished episodes.
use std::collections::VecDeque;

/// Mean episode reward and success rate over the latest episodes.
#[derive(Clone, Debug)]
pub struct RunningStats {
    window: usize,
    rewards: VecDeque<f32>,
    successes: VecDeque<bool>,
}

impl RunningStats {
    /// Creates statistics over the latest `window` episodes.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            rewards: VecDeque::new(),
            successes: VecDeque::new(),
        }
    }

    /// Adds a finished episode.
    pub fn push(&mut self, reward: f32, success: bool) {
        if self.rewards.len() == self.window {
            self.rewards.pop_front();
            self.successes.pop_front();
        }
        self.rewards.push_back(reward);
        self.successes.push_back(success);
    }

    /// Mean reward, `0` before the first episode.
    pub fn mean_reward(&self) -> f32 {
        if self.rewards.is_empty() {
            return 0.0;
        }
        self.rewards.iter().sum::<f32>() / self.rewards.len() as f32
    }

    /// Fraction of successful episodes, `0` before the first episode.
    pub fn success_rate(&self) -> f32 {
        if self.successes.is_empty() {
            return 0.0;
        }
        self.successes.iter().filter(|&&s| s).count() as f32 / self.successes.len() as f32
    }
}
