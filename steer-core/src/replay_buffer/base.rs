//! Fixed-capacity replay buffer with optional prioritized sampling.
mod iw_scheduler;
mod sum_tree;
use super::{PerConfig, ReplayBufferConfig, Transition, TransitionBatch};
use crate::{error::SteerError, ExperienceBufferBase, ReplayBufferBase};
use anyhow::Result;
pub use iw_scheduler::IwScheduler;
use log::trace;
use ndarray::Array2;
use rand::{rngs::StdRng, seq::index, SeedableRng};
pub use sum_tree::SumTree;

/// State for prioritized experience replay.
struct PerState {
    sum_tree: SumTree,
    iw_scheduler: IwScheduler,
    alpha: f32,
    eps: f32,
    max_priority: f32,

    /// The largest priority written so far.
    max_seen: Option<f32>,
}

impl PerState {
    fn new(capacity: usize, per_config: &PerConfig) -> Self {
        Self {
            sum_tree: SumTree::new(capacity),
            iw_scheduler: IwScheduler::new(
                per_config.beta_0,
                per_config.beta_final,
                per_config.n_opts_final,
            ),
            alpha: per_config.alpha,
            eps: per_config.eps,
            max_priority: per_config.max_priority,
            max_seen: None,
        }
    }

    /// Rejects negative or non-finite priorities and clips the rest to `[eps, max_priority]`.
    fn clip(&self, p: f32) -> Result<f32, SteerError> {
        if !p.is_finite() || p < 0.0 {
            return Err(SteerError::InvalidPriority(p));
        }
        Ok(p.clamp(self.eps, self.max_priority))
    }

    fn set(&mut self, ix: usize, p: f32) {
        self.sum_tree.set(ix, p);
        self.max_seen = Some(self.max_seen.map_or(p, |m| m.max(p)));
    }

    fn default_priority(&self) -> f32 {
        self.max_seen.unwrap_or(self.max_priority)
    }
}

/// A circular buffer of transitions.
///
/// Transitions are stored column-wise. Slot `i` is overwritten by the
/// `(k * capacity + i)`-th insertion, so after `capacity + k` insertions the
/// buffer holds exactly the latest `capacity` transitions.
pub struct PrioritizedReplayBuffer {
    capacity: usize,
    obs_dim: usize,
    n_actions: usize,

    /// Next slot to write.
    i: usize,

    /// Number of live transitions.
    size: usize,

    /// Number of insertions since construction.
    total_pushed: usize,

    obs: Vec<f32>,
    act: Vec<usize>,
    next_obs: Vec<f32>,
    reward: Vec<f32>,
    is_done: Vec<i8>,
    rng: StdRng,
    per_state: Option<PerState>,
}

impl PrioritizedReplayBuffer {
    fn check_transition(&self, tr: &Transition) -> Result<(), SteerError> {
        if tr.obs.len() != self.obs_dim {
            return Err(SteerError::ShapeMismatch {
                what: "transition obs".into(),
                expected: self.obs_dim,
                actual: tr.obs.len(),
            });
        }
        if tr.next_obs.len() != self.obs_dim {
            return Err(SteerError::ShapeMismatch {
                what: "transition next_obs".into(),
                expected: self.obs_dim,
                actual: tr.next_obs.len(),
            });
        }
        if tr.act >= self.n_actions {
            return Err(SteerError::IndexOutOfRange {
                index: tr.act,
                len: self.n_actions,
            });
        }
        if tr.is_done != 0 && tr.is_done != 1 {
            return Err(SteerError::InvalidConfig(format!(
                "done flag must be 0 or 1, got {}",
                tr.is_done
            )));
        }
        Ok(())
    }

    /// Inserts a transition at the write pointer.
    ///
    /// With prioritization, `priority` is clipped to `[eps, max_priority]`; if
    /// omitted, the largest priority written so far is used (the upper bound on
    /// the first insertion), so that new transitions get sampled at least once.
    /// Without prioritization, `priority` is ignored.
    pub fn insert(&mut self, tr: Transition, priority: Option<f32>) -> Result<()> {
        self.check_transition(&tr)?;
        let slot = self.i;

        if let Some(per_state) = &mut self.per_state {
            let p = match priority {
                Some(p) => per_state.clip(p)?,
                None => per_state.default_priority(),
            };
            per_state.set(slot, p);
        }

        let d = self.obs_dim;
        self.obs[slot * d..(slot + 1) * d].copy_from_slice(&tr.obs);
        self.next_obs[slot * d..(slot + 1) * d].copy_from_slice(&tr.next_obs);
        self.act[slot] = tr.act;
        self.reward[slot] = tr.reward;
        self.is_done[slot] = tr.is_done;

        self.i = (self.i + 1) % self.capacity;
        self.size = (self.size + 1).min(self.capacity);
        self.total_pushed += 1;

        Ok(())
    }

    /// Sets the priority of the transition at slot `ix`.
    ///
    /// The priority is clipped to `[eps, max_priority]`. Does nothing without
    /// prioritization.
    pub fn update(&mut self, ix: usize, priority: f32) -> Result<()> {
        if ix >= self.size {
            return Err(SteerError::IndexOutOfRange {
                index: ix,
                len: self.size,
            }
            .into());
        }
        if let Some(per_state) = &mut self.per_state {
            let p = per_state.clip(priority)?;
            per_state.set(ix, p);
        }
        Ok(())
    }

    /// Returns the transition stored at slot `ix`.
    pub fn transition(&self, ix: usize) -> Result<Transition> {
        if ix >= self.size {
            return Err(SteerError::IndexOutOfRange {
                index: ix,
                len: self.size,
            }
            .into());
        }
        let d = self.obs_dim;
        Ok(Transition {
            obs: self.obs[ix * d..(ix + 1) * d].to_vec(),
            act: self.act[ix],
            reward: self.reward[ix],
            next_obs: self.next_obs[ix * d..(ix + 1) * d].to_vec(),
            is_done: self.is_done[ix],
        })
    }

    /// Returns the live transitions, oldest first.
    pub fn transitions_oldest_first(&self) -> Vec<Transition> {
        let start = if self.size < self.capacity { 0 } else { self.i };
        (0..self.size)
            .filter_map(|k| self.transition((start + k) % self.capacity).ok())
            .collect()
    }

    /// Returns the number of insertions since construction.
    pub fn total_pushed(&self) -> usize {
        self.total_pushed
    }

    /// Returns `true` if prioritized sampling is enabled.
    pub fn is_prioritized(&self) -> bool {
        self.per_state.is_some()
    }

    /// Returns the total priority mass, `None` without prioritization.
    pub fn total_priority(&self) -> Option<f32> {
        self.per_state.as_ref().map(|s| s.sum_tree.total())
    }

    /// Returns the priority of slot `ix`, `None` without prioritization.
    pub fn priority(&self, ix: usize) -> Option<f32> {
        self.per_state
            .as_ref()
            .filter(|_| ix < self.size)
            .map(|s| s.sum_tree.priority(ix))
    }

    /// Returns the largest priority written so far, `None` without prioritization.
    pub fn max_priority(&self) -> Option<f32> {
        self.per_state.as_ref().and_then(|s| s.max_seen)
    }

    /// Returns the current importance sampling exponent, `None` without prioritization.
    pub fn beta(&self) -> Option<f32> {
        self.per_state.as_ref().map(|s| s.iw_scheduler.beta())
    }

    /// Returns `true` if the parent-sum invariant of the sum tree holds.
    ///
    /// Always `true` without prioritization.
    pub fn check_invariant(&self) -> bool {
        self.per_state
            .as_ref()
            .map_or(true, |s| s.sum_tree.check_invariant())
    }

    /// Computes normalized importance sampling weights of the given slots.
    ///
    /// `w_i = (N * p_i / total)^(-beta)`, divided by the largest weight in the batch.
    fn weights(per_state: &PerState, size: usize, ixs: &[usize]) -> Vec<f32> {
        let total = per_state.sum_tree.total();
        let beta = per_state.iw_scheduler.beta();
        let n = size as f32;
        let ws = ixs
            .iter()
            .map(|&ix| (n * per_state.sum_tree.priority(ix) / total).powf(-beta))
            .collect::<Vec<_>>();
        let w_max = ws.iter().fold(f32::MIN, |m, &w| m.max(w));
        ws.iter().map(|w| w / w_max).collect()
    }

    fn gather(&self, ixs: Vec<usize>, weight: Vec<f32>) -> Result<TransitionBatch> {
        let d = self.obs_dim;
        let n = ixs.len();
        let mut obs = Vec::with_capacity(n * d);
        let mut next_obs = Vec::with_capacity(n * d);
        for &ix in ixs.iter() {
            obs.extend_from_slice(&self.obs[ix * d..(ix + 1) * d]);
            next_obs.extend_from_slice(&self.next_obs[ix * d..(ix + 1) * d]);
        }

        Ok(TransitionBatch {
            obs: Array2::from_shape_vec((n, d), obs)?,
            act: ixs.iter().map(|&ix| self.act[ix]).collect(),
            next_obs: Array2::from_shape_vec((n, d), next_obs)?,
            reward: ixs.iter().map(|&ix| self.reward[ix]).collect(),
            is_done: ixs.iter().map(|&ix| self.is_done[ix]).collect(),
            ix_sample: ixs,
            weight,
        })
    }
}

impl ExperienceBufferBase for PrioritizedReplayBuffer {
    type Item = Transition;

    fn len(&self) -> usize {
        self.size
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts a transition with the default priority.
    fn push(&mut self, tr: Self::Item) -> Result<()> {
        self.insert(tr, None)
    }
}

impl ReplayBufferBase for PrioritizedReplayBuffer {
    type Config = ReplayBufferConfig;
    type Batch = TransitionBatch;

    fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn build(config: &Self::Config) -> Result<Self> {
        config.validate()?;
        let capacity = config.capacity;
        let per_state = config
            .per_config
            .as_ref()
            .map(|per_config| PerState::new(capacity, per_config));

        Ok(Self {
            capacity,
            obs_dim: config.obs_dim,
            n_actions: config.n_actions,
            i: 0,
            size: 0,
            total_pushed: 0,
            obs: vec![0.; capacity * config.obs_dim],
            act: vec![0; capacity],
            next_obs: vec![0.; capacity * config.obs_dim],
            reward: vec![0.; capacity],
            is_done: vec![0; capacity],
            rng: StdRng::seed_from_u64(config.seed),
            per_state,
        })
    }

    /// Samples a batch of transitions.
    ///
    /// With prioritization, slots are drawn by stratified sampling over the
    /// priority mass. Otherwise, `size` distinct slots are drawn uniformly and
    /// all weights are 1.
    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        if size == 0 || self.size < size {
            return Err(SteerError::InsufficientData {
                required: size,
                available: self.size,
            }
            .into());
        }

        let (ixs, weight) = match &self.per_state {
            Some(per_state) => {
                if per_state.sum_tree.total() <= 0.0 {
                    return Err(SteerError::InsufficientData {
                        required: size,
                        available: 0,
                    }
                    .into());
                }
                let ixs = per_state.sum_tree.sample(size, &mut self.rng);
                let weight = Self::weights(per_state, self.size, &ixs);
                (ixs, weight)
            }
            None => {
                let ixs = index::sample(&mut self.rng, self.size, size).into_vec();
                (ixs, vec![1f32; size])
            }
        };
        trace!("Sampled slots {:?}", ixs);

        self.gather(ixs, weight)
    }

    /// Converts absolute TD errors into priorities `(|td| + eps)^alpha`.
    ///
    /// Also advances the schedule of `beta`.
    fn update_priority(&mut self, ixs: &[usize], td_errs: &[f32]) -> Result<()> {
        if ixs.len() != td_errs.len() {
            return Err(SteerError::ShapeMismatch {
                what: "td errors".into(),
                expected: ixs.len(),
                actual: td_errs.len(),
            }
            .into());
        }

        let (alpha, eps) = match &self.per_state {
            Some(s) => (s.alpha, s.eps),
            None => return Ok(()),
        };
        for (&ix, &td_err) in ixs.iter().zip(td_errs.iter()) {
            self.update(ix, (td_err.abs() + eps).powf(alpha))?;
        }
        if let Some(per_state) = &mut self.per_state {
            per_state.iw_scheduler.add_n_opts();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tr(k: usize, obs_dim: usize) -> Transition {
        Transition::new(
            vec![k as f32; obs_dim],
            k % 3,
            k as f32,
            vec![k as f32 + 0.5; obs_dim],
            (k % 2) as i8,
        )
    }

    fn per_buffer(capacity: usize) -> PrioritizedReplayBuffer {
        let config = ReplayBufferConfig::default()
            .capacity(capacity)
            .obs_dim(2)
            .n_actions(3)
            .per_config(Some(PerConfig::default().eps(0.01).max_priority(100.0)));
        PrioritizedReplayBuffer::build(&config).unwrap()
    }

    fn uniform_buffer(capacity: usize) -> PrioritizedReplayBuffer {
        let config = ReplayBufferConfig::default()
            .capacity(capacity)
            .obs_dim(2)
            .n_actions(3);
        PrioritizedReplayBuffer::build(&config).unwrap()
    }

    #[test]
    fn test_eviction_keeps_latest() {
        let capacity = 5;
        for k in 0..=7 {
            let mut buffer = per_buffer(capacity);
            for j in 0..capacity + k {
                buffer.insert(tr(j, 2), Some(1.0)).unwrap();
                assert!(buffer.check_invariant());
            }
            let live = buffer.transitions_oldest_first();
            let expected = (k..capacity + k).map(|j| tr(j, 2)).collect::<Vec<_>>();
            assert_eq!(live, expected);
            assert_eq!(buffer.len(), capacity);
            assert_eq!(buffer.total_pushed(), capacity + k);
        }
    }

    #[test]
    fn test_default_priority_is_max_seen() {
        let mut buffer = per_buffer(8);
        buffer.insert(tr(0, 2), None).unwrap();
        assert_eq!(buffer.priority(0), Some(100.0));

        buffer.update(0, 3.0).unwrap();
        buffer.insert(tr(1, 2), None).unwrap();
        // 100 is still the largest priority ever written
        assert_eq!(buffer.priority(1), Some(100.0));

        let mut buffer = per_buffer(8);
        buffer.insert(tr(0, 2), Some(3.0)).unwrap();
        buffer.insert(tr(1, 2), None).unwrap();
        assert_eq!(buffer.priority(1), Some(3.0));
    }

    #[test]
    fn test_priority_is_clipped_or_rejected() {
        let mut buffer = per_buffer(4);
        buffer.insert(tr(0, 2), Some(0.0)).unwrap();
        assert_eq!(buffer.priority(0), Some(0.01));
        buffer.update(0, 1e6).unwrap();
        assert_eq!(buffer.priority(0), Some(100.0));

        for bad in [-1.0, f32::NAN, f32::INFINITY] {
            let err = buffer.update(0, bad).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<SteerError>(),
                Some(SteerError::InvalidPriority(_))
            ));
            let err = buffer.insert(tr(1, 2), Some(bad)).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<SteerError>(),
                Some(SteerError::InvalidPriority(_))
            ));
        }
        assert_eq!(buffer.priority(0), Some(100.0));
        assert_eq!(buffer.len(), 1);
        assert!(buffer.check_invariant());
    }

    #[test]
    fn test_malformed_transition_is_rejected() {
        let mut buffer = per_buffer(4);
        assert!(buffer.insert(tr(0, 3), None).is_err());
        let mut bad_act = tr(0, 2);
        bad_act.act = 3;
        assert!(buffer.insert(bad_act, None).is_err());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_insufficient_data() {
        for mut buffer in [per_buffer(8), uniform_buffer(8)] {
            let err = buffer.batch(1).unwrap_err();
            assert_eq!(
                err.downcast_ref::<SteerError>(),
                Some(&SteerError::InsufficientData {
                    required: 1,
                    available: 0
                })
            );
            for j in 0..3 {
                buffer.push(tr(j, 2)).unwrap();
            }
            let err = buffer.batch(4).unwrap_err();
            assert_eq!(
                err.downcast_ref::<SteerError>(),
                Some(&SteerError::InsufficientData {
                    required: 4,
                    available: 3
                })
            );
            assert_eq!(buffer.batch(3).unwrap().len(), 3);
        }
    }

    #[test]
    fn test_sampling_frequency_follows_priority() {
        let mut buffer = per_buffer(2);
        buffer.insert(tr(0, 2), Some(1.0)).unwrap();
        buffer.insert(tr(1, 2), Some(10.0)).unwrap();

        let mut counts = [0usize; 2];
        for _ in 0..20000 {
            let batch = buffer.batch(1).unwrap();
            counts[batch.ix_sample[0]] += 1;
        }
        let ratio = counts[1] as f32 / counts[0] as f32;
        assert!((8.5..11.5).contains(&ratio), "ratio = {}", ratio);
    }

    #[test]
    fn test_stratified_draws_and_weights() {
        let mut buffer = per_buffer(4);
        for (j, p) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            buffer.insert(tr(j, 2), Some(*p)).unwrap();
        }
        assert_eq!(buffer.total_priority(), Some(10.0));

        // Segments [0, 5) and [5, 10)
        let per_state = buffer.per_state.as_ref().unwrap();
        let ixs = vec![per_state.sum_tree.find(0.5), per_state.sum_tree.find(7.5)];
        assert_eq!(ixs, vec![0, 3]);
        let ws = PrioritizedReplayBuffer::weights(per_state, 4, &ixs);
        assert!(ws.iter().all(|&w| w <= 1.0));
        assert!(ws[1] < ws[0]);
        assert_eq!(ws[0], 1.0);

        let batch = buffer.batch(2).unwrap();
        assert!(batch.ix_sample[0] <= 2);
        assert!(batch.ix_sample[1] >= 2);
        assert!(batch.weight.iter().all(|&w| w > 0.0 && w <= 1.0));
        assert_eq!(batch.obs.dim(), (2, 2));
    }

    #[test]
    fn test_uniform_mode() {
        let mut buffer = uniform_buffer(10);
        for j in 0..10 {
            buffer.insert(tr(j, 2), Some(123.0)).unwrap();
        }
        assert!(!buffer.is_prioritized());
        let batch = buffer.batch(10).unwrap();
        let mut ixs = batch.ix_sample.clone();
        ixs.sort_unstable();
        assert_eq!(ixs, (0..10).collect::<Vec<_>>());
        assert!(batch.weight.iter().all(|&w| w == 1.0));
        assert!(buffer.update_priority(&[0], &[5.0]).is_ok());
    }

    #[test]
    fn test_update_priority_from_td_errors() {
        let mut buffer = per_buffer(4);
        for j in 0..4 {
            buffer.push(tr(j, 2)).unwrap();
        }
        let beta = buffer.beta().unwrap();
        buffer.update_priority(&[1, 2], &[-0.99, 3.99]).unwrap();
        let alpha = PerConfig::default().alpha;
        assert!((buffer.priority(1).unwrap() - 1f32.powf(alpha)).abs() < 1e-5);
        assert!((buffer.priority(2).unwrap() - 4f32.powf(alpha)).abs() < 1e-5);
        assert!(buffer.beta().unwrap() > beta);
        assert!(buffer.check_invariant());

        assert!(buffer.update_priority(&[1, 2], &[0.1]).is_err());
        assert!(buffer.update_priority(&[1], &[f32::NAN]).is_err());
    }
}
