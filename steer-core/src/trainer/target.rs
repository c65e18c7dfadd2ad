//! Bootstrapped targets of Q-learning.
use super::explorer::argmax;
use crate::error::SteerError;
use anyhow::Result;
use ndarray::Array2;

/// Computes regression targets for a batch.
///
/// With `q_next_online`, the next action is chosen by the online network and
/// evaluated by the target network (double Q-learning):
/// `r + gamma * Q_target(s', argmax_a Q_online(s', a))`. Without it,
/// `r + gamma * max_a Q_target(s', a)`. Terminal transitions get `r`.
pub fn compute_targets(
    reward: &[f32],
    is_done: &[i8],
    q_next_target: &Array2<f32>,
    q_next_online: Option<&Array2<f32>>,
    gamma: f32,
) -> Result<Vec<f32>> {
    let n = reward.len();
    for (what, len) in [
        ("is_done", is_done.len()),
        ("q_next_target", q_next_target.nrows()),
        ("q_next_online", q_next_online.map_or(n, |q| q.nrows())),
    ] {
        if len != n {
            return Err(SteerError::ShapeMismatch {
                what: what.into(),
                expected: n,
                actual: len,
            }
            .into());
        }
    }

    let targets = (0..n)
        .map(|i| {
            if is_done[i] == 1 {
                return reward[i];
            }
            let next = q_next_target.row(i);
            let v = match q_next_online {
                Some(q) => next[argmax(q.row(i))],
                None => next[argmax(next)],
            };
            reward[i] + gamma * v
        })
        .collect();
    Ok(targets)
}

/// TD errors `target - Q(s, a)` of the taken actions.
pub fn td_errors(q: &Array2<f32>, act: &[usize], targets: &[f32]) -> Vec<f32> {
    act.iter()
        .zip(targets.iter())
        .enumerate()
        .map(|(i, (&a, &t))| t - q[[i, a]])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_double_targets() {
        let q_next_target = array![[1.0, 10.0], [3.0, 4.0], [7.0, 8.0]];
        let q_next_online = array![[5.0, 0.0], [0.0, 1.0], [0.0, 1.0]];
        let targets = compute_targets(
            &[1.0, 2.0, 3.0],
            &[0, 0, 1],
            &q_next_target,
            Some(&q_next_online),
            0.5,
        )
        .unwrap();
        // The online argmax picks the first action of row 0, not the larger target value
        assert_eq!(targets, vec![1.5, 4.0, 3.0]);
    }

    #[test]
    fn test_single_targets() {
        let q_next_target = array![[1.0, 10.0], [3.0, 4.0]];
        let targets = compute_targets(&[1.0, 2.0], &[0, 1], &q_next_target, None, 0.5).unwrap();
        assert_eq!(targets, vec![6.0, 2.0]);
        assert!(compute_targets(&[1.0], &[0, 1], &q_next_target, None, 0.5).is_err());
    }

    #[test]
    fn test_td_errors() {
        let q = array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(td_errors(&q, &[1, 0], &[2.5, 1.0]), vec![0.5, -2.0]);
    }
}
