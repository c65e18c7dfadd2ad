//! Sum tree for prioritized sampling.
use rand::Rng;

/// Binary tree whose leaves hold priorities and whose internal nodes hold the
/// sum of their children.
///
/// The tree is stored in heap order: node `k` has children `2k + 1` and
/// `2k + 2`. The number of leaves is `capacity` rounded up to a power of two,
/// so that leaves are laid out left to right in slot order. Padding leaves
/// stay at zero and are never sampled.
#[derive(Debug, Clone)]
pub struct SumTree {
    capacity: usize,
    n_leaves: usize,
    tree: Vec<f32>,
}

impl SumTree {
    /// Creates a tree with all priorities set to zero.
    pub fn new(capacity: usize) -> Self {
        let n_leaves = capacity.max(1).next_power_of_two();
        Self {
            capacity,
            n_leaves,
            tree: vec![0f32; 2 * n_leaves - 1],
        }
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the total priority mass.
    pub fn total(&self) -> f32 {
        self.tree[0]
    }

    /// Returns the priority of the `ix`-th slot.
    pub fn priority(&self, ix: usize) -> f32 {
        self.tree[ix + self.n_leaves - 1]
    }

    /// Sets the priority of the `ix`-th slot and refreshes its ancestors.
    ///
    /// The priority must be finite and non-negative; the caller checks it.
    pub fn set(&mut self, ix: usize, p: f32) {
        debug_assert!(ix < self.capacity);
        debug_assert!(p.is_finite() && p >= 0.0);

        let mut node = ix + self.n_leaves - 1;
        self.tree[node] = p;
        while node != 0 {
            node = (node - 1) / 2;
            self.tree[node] = self.tree[2 * node + 1] + self.tree[2 * node + 2];
        }

        debug_assert!(self.check_path(ix));
    }

    fn retrieve(&self, node: usize, s: f32) -> usize {
        let left = 2 * node + 1;
        let right = left + 1;

        if left >= self.tree.len() {
            return node;
        }

        if s < self.tree[left] || self.tree[right] <= 0f32 {
            self.retrieve(left, s)
        } else {
            self.retrieve(right, s - self.tree[left])
        }
    }

    /// Returns the slot whose cumulative priority interval contains `s`.
    ///
    /// Slot `i` covers `[sum(p_0..p_i), sum(p_0..=p_i))`. Values at or beyond
    /// the total fall into the last slot with positive priority.
    pub fn find(&self, s: f32) -> usize {
        let node = self.retrieve(0, s.max(0.0));
        debug_assert!(node >= self.n_leaves - 1);
        node + 1 - self.n_leaves
    }

    /// Draws `batch_size` slots by stratified sampling.
    ///
    /// `[0, total)` is split into `batch_size` segments of equal width and one
    /// uniform value is drawn in each segment.
    pub fn sample(&self, batch_size: usize, rng: &mut impl Rng) -> Vec<usize> {
        let total = self.total();
        let segment = total / batch_size as f32;
        (0..batch_size)
            .map(|i| {
                let s = segment * (i as f32 + rng.gen::<f32>());
                self.find(s)
            })
            .collect()
    }

    fn check_path(&self, ix: usize) -> bool {
        let mut node = ix + self.n_leaves - 1;
        while node != 0 {
            node = (node - 1) / 2;
            if self.tree[node] != self.tree[2 * node + 1] + self.tree[2 * node + 2] {
                return false;
            }
        }
        true
    }

    /// Returns `true` if every internal node equals the sum of its children.
    pub fn check_invariant(&self) -> bool {
        (0..self.n_leaves - 1).all(|k| self.tree[k] == self.tree[2 * k + 1] + self.tree[2 * k + 2])
    }
}

#[cfg(test)]
mod tests {
    use super::SumTree;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_sum_tree_odd() {
        let data = vec![0.5f32, 0.2, 0.8, 0.3, 1.1, 2.5, 3.9];
        let mut sum_tree = SumTree::new(7);
        for ix in 0..data.len() {
            sum_tree.set(ix, data[ix]);
            assert!(sum_tree.check_invariant());
        }

        assert_eq!(sum_tree.find(0.0), 0);
        assert_eq!(sum_tree.find(0.4), 0);
        assert_eq!(sum_tree.find(0.5), 1);
        assert_eq!(sum_tree.find(0.6), 1);
        assert_eq!(sum_tree.find(1.2), 2);
        assert_eq!(sum_tree.find(1.6), 3);
        assert_eq!(sum_tree.find(2.0), 4);
        assert_eq!(sum_tree.find(2.8), 4);
        assert_eq!(sum_tree.find(100.0), 6);
    }

    #[test]
    fn test_update_keeps_invariant() {
        let mut sum_tree = SumTree::new(5);
        let mut rng = StdRng::seed_from_u64(7);
        for step in 0..200 {
            let ix = step % 5;
            let p = (step as f32 * 0.37).sin().abs() + 0.01;
            sum_tree.set(ix, p);
            assert!(sum_tree.check_invariant());
        }
        let ixs = sum_tree.sample(64, &mut rng);
        assert!(ixs.iter().all(|&ix| ix < 5));
    }

    #[test]
    fn test_zero_priority_is_never_found() {
        let mut sum_tree = SumTree::new(4);
        sum_tree.set(0, 1.0);
        sum_tree.set(2, 1.0);
        let mut rng = StdRng::seed_from_u64(0);
        let ixs = sum_tree.sample(1000, &mut rng);
        assert!(ixs.iter().all(|&ix| ix == 0 || ix == 2));
    }
}
