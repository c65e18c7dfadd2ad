//! Value-function approximator.
use crate::error::SteerError;
use anyhow::Result;
use ndarray::Array2;
use std::path::Path;

/// Shapes of the parameters of a network, in a fixed order.
///
/// Online and target networks must report identical layouts, which makes a
/// parameter copy a position-by-position assignment.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ParamLayout(Vec<Vec<usize>>);

impl ParamLayout {
    /// Creates a layout from parameter shapes.
    pub fn new(shapes: Vec<Vec<usize>>) -> Self {
        Self(shapes)
    }

    /// Returns the parameter shapes.
    pub fn shapes(&self) -> &[Vec<usize>] {
        &self.0
    }

    /// Returns the number of scalar parameters.
    pub fn n_elements(&self) -> usize {
        self.0.iter().map(|s| s.iter().product::<usize>()).sum()
    }

    /// Fails if `other` does not have the same layout.
    pub fn check_parity(&self, other: &ParamLayout) -> Result<(), SteerError> {
        if self.0.len() != other.0.len() {
            return Err(SteerError::ParamLayoutMismatch(format!(
                "{} vs {} parameter tensors",
                self.0.len(),
                other.0.len()
            )));
        }
        for (i, (s1, s2)) in self.0.iter().zip(other.0.iter()).enumerate() {
            if s1 != s2 {
                return Err(SteerError::ParamLayoutMismatch(format!(
                    "tensor {}: {:?} vs {:?}",
                    i, s1, s2
                )));
            }
        }
        Ok(())
    }
}

/// Action-value function approximator.
///
/// Observations are passed as `(n, obs_dim)` arrays, action values are returned
/// as `(n, n_actions)` arrays. The network and its optimizer are opaque to the
/// trainer.
pub trait Learner {
    /// Parameters copied from the online network into the target network.
    type Params;

    /// Dimension of an observation.
    fn obs_dim(&self) -> usize;

    /// Number of discrete actions.
    fn n_actions(&self) -> usize;

    /// Computes action values for a batch of observations.
    fn predict(&self, obs: &Array2<f32>) -> Result<Array2<f32>>;

    /// Performs a gradient step towards `target` for the taken actions.
    ///
    /// `weight` holds importance-sampling weights, one per sample. Returns the loss.
    fn train_on_batch(
        &mut self,
        obs: &Array2<f32>,
        act: &[usize],
        target: &[f32],
        weight: &[f32],
    ) -> Result<f32>;

    /// Returns the parameter layout.
    fn param_layout(&self) -> ParamLayout;

    /// Returns a copy of the parameters.
    fn get_parameters(&self) -> Result<Self::Params>;

    /// Overwrites the parameters.
    fn set_parameters(&mut self, params: &Self::Params) -> Result<()>;

    /// Saves the parameters in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Loads the parameters from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_parity() {
        let l1 = ParamLayout::new(vec![vec![80, 21], vec![80], vec![5, 80], vec![5]]);
        let l2 = l1.clone();
        let l3 = ParamLayout::new(vec![vec![80, 21], vec![80], vec![3, 80], vec![3]]);

        assert!(l1.check_parity(&l2).is_ok());
        assert!(matches!(
            l1.check_parity(&l3),
            Err(SteerError::ParamLayoutMismatch(_))
        ));
        assert!(l1.check_parity(&ParamLayout::default()).is_err());
        assert_eq!(l1.n_elements(), 80 * 21 + 80 + 5 * 80 + 5);
    }
}
