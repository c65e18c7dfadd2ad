//! Epsilon-greedy exploration.
use anyhow::Result;
use ndarray::{Array2, ArrayView1};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`EpsilonGreedy`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ExplorerConfig {
    /// Initial value of epsilon.
    pub eps_init: f32,

    /// Lower bound of epsilon.
    pub eps_final: f32,

    /// Multiplicative decay applied every `anneal_interval` global steps.
    pub eps_decay: f32,

    /// Interval of decay in global steps.
    pub anneal_interval: usize,

    /// Random seed.
    pub seed: u64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            eps_init: 1.0,
            eps_final: 0.1,
            eps_decay: 0.995,
            anneal_interval: 1800,
            seed: 42,
        }
    }
}

impl ExplorerConfig {
    /// Sets the initial value of epsilon.
    pub fn eps_init(mut self, v: f32) -> Self {
        self.eps_init = v;
        self
    }

    /// Sets the lower bound of epsilon.
    pub fn eps_final(mut self, v: f32) -> Self {
        self.eps_final = v;
        self
    }

    /// Sets the decay rate of epsilon.
    pub fn eps_decay(mut self, v: f32) -> Self {
        self.eps_decay = v;
        self
    }

    /// Sets the interval of decay in global steps.
    pub fn anneal_interval(mut self, v: usize) -> Self {
        self.anneal_interval = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Picks a uniformly random action with probability epsilon, the greedy one otherwise.
pub struct EpsilonGreedy {
    eps_final: f32,
    eps_decay: f32,
    anneal_interval: usize,
    rng: SmallRng,
}

impl EpsilonGreedy {
    /// Creates an explorer.
    pub fn new(config: &ExplorerConfig) -> Self {
        Self {
            eps_final: config.eps_final,
            eps_decay: config.eps_decay,
            anneal_interval: config.anneal_interval,
            rng: SmallRng::seed_from_u64(config.seed),
        }
    }

    /// Returns epsilon for the given global step.
    ///
    /// Decays `eps` once whenever `global_step` is a positive multiple of
    /// `anneal_interval`, never going below the floor.
    pub fn decay(&self, eps: f32, global_step: usize) -> f32 {
        if global_step > 0 && global_step % self.anneal_interval == 0 {
            (eps * self.eps_decay).max(self.eps_final).min(eps)
        } else {
            eps
        }
    }

    /// Selects one action per row of `q`.
    pub fn select(&mut self, q: &Array2<f32>, eps: f32) -> Vec<usize> {
        let n_actions = q.ncols();
        q.rows()
            .into_iter()
            .map(|row| {
                if self.rng.gen::<f32>() < eps {
                    self.rng.gen_range(0..n_actions)
                } else {
                    argmax(row)
                }
            })
            .collect()
    }
}

/// Index of the largest value, the first one on ties.
pub fn argmax(row: ArrayView1<f32>) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_decay_schedule() {
        let explorer = EpsilonGreedy::new(&ExplorerConfig::default().anneal_interval(6).eps_decay(0.5));
        let mut eps = 1.0;
        let mut trace = vec![];
        for global_step in (0..48).step_by(3) {
            eps = explorer.decay(eps, global_step);
            trace.push(eps);
        }
        assert_eq!(trace[0], 1.0);
        assert_eq!(trace[1], 1.0);
        assert_eq!(trace[2], 0.5);
        assert_eq!(trace[4], 0.25);
        assert_eq!(trace[6], 0.125);
        assert_eq!(*trace.last().unwrap(), 0.1);
        assert!(trace.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_floor_is_sticky() {
        let explorer = EpsilonGreedy::new(&ExplorerConfig::default().anneal_interval(1));
        let mut eps = 0.1;
        for global_step in 1..100 {
            eps = explorer.decay(eps, global_step);
            assert_eq!(eps, 0.1);
        }
        // Below the floor (e.g. set by hand) epsilon never goes up
        assert_eq!(explorer.decay(0.05, 10), 0.05);
    }

    #[test]
    fn test_greedy_selection() {
        let mut explorer = EpsilonGreedy::new(&ExplorerConfig::default());
        let q = array![[0.0, 2.0, 1.0], [5.0, -1.0, 5.0]];
        assert_eq!(explorer.select(&q, 0.0), vec![1, 0]);

        let random = (0..200)
            .flat_map(|_| explorer.select(&q, 1.0))
            .collect::<Vec<_>>();
        assert!(random.iter().all(|&a| a < 3));
        assert!(random.contains(&2) && random.contains(&1));
    }
}
