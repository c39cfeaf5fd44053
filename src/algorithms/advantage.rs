//! Advantage Estimation
//!
//! Discounted returns and Generalized Advantage Estimation (GAE) over whole
//! trajectories. A trajectory's last step is never bootstrapped: it is
//! treated as the end of the episode whether it ended with `done` or with a
//! forced cutoff.

use burn::prelude::*;

use crate::core::tensor::{rows_to_tensor, tensor_to_vec};
use crate::error::{PpoError, Result};
use crate::memory::Trajectory;
use crate::networks::ValueFunction;

/// Discounted return of every step: `R_i = r_i + gamma * R_{i+1}`
pub fn discounted_returns(rewards: &[f32], gamma: f32) -> Vec<f32> {
    let n = rewards.len();
    let mut returns = vec![0.0f32; n];
    if n == 0 {
        return returns;
    }

    returns[n - 1] = rewards[n - 1];
    for i in (0..n - 1).rev() {
        returns[i] = rewards[i] + gamma * returns[i + 1];
    }
    returns
}

/// GAE advantages from rewards and value estimates of the same trajectory
pub fn gae(rewards: &[f32], values: &[f32], gamma: f32, lam: f32) -> Result<Vec<f32>> {
    let n = rewards.len();
    if values.len() != n {
        return Err(PpoError::shape("value estimates", n, values.len()));
    }

    let mut advantages = vec![0.0f32; n];
    if n == 0 {
        return Ok(advantages);
    }

    advantages[n - 1] = rewards[n - 1] - values[n - 1];
    for i in (0..n - 1).rev() {
        let delta = rewards[i] + gamma * values[i + 1] - values[i];
        advantages[i] = delta + gamma * lam * advantages[i + 1];
    }
    Ok(advantages)
}

/// Fill `estimated_value`, `discounted_return` and `advantage` of every
/// transition, one value-function forward pass per trajectory.
pub fn annotate<B: Backend, V: ValueFunction<B>>(
    trajectories: &mut [Trajectory],
    value_fn: &V,
    gamma: f32,
    lam: f32,
    device: &B::Device,
) -> Result<()> {
    let obs_dim = value_fn.observation_dim();

    for trajectory in trajectories.iter_mut() {
        if trajectory.is_empty() {
            continue;
        }

        let states = rows_to_tensor::<B>(&trajectory.states(), obs_dim, "observation", device)?;
        let values = tensor_to_vec(value_fn.forward(states));
        let rewards = trajectory.rewards();

        let returns = discounted_returns(&rewards, gamma);
        let advantages = gae(&rewards, &values, gamma, lam)?;

        for (i, transition) in trajectory.transitions_mut().iter_mut().enumerate() {
            transition.estimated_value = Some(values[i]);
            transition.discounted_return = Some(returns[i]);
            transition.advantage = Some(advantages[i]);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Action, Transition};
    use crate::networks::MlpValueFunctionConfig;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn assert_all_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_gae_undiscounted_zero_values() {
        let adv = gae(&[1.0, 1.0, 1.0], &[0.0, 0.0, 0.0], 1.0, 1.0).unwrap();
        assert_all_close(&adv, &[3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_discounted_returns() {
        assert_all_close(&discounted_returns(&[1.0, 1.0, 1.0], 0.5), &[1.75, 1.5, 1.0]);
    }

    #[test]
    fn test_single_step_trajectory() {
        assert_all_close(&discounted_returns(&[2.0], 0.9), &[2.0]);
        assert_all_close(&gae(&[2.0], &[0.5], 0.9, 0.95).unwrap(), &[1.5]);
    }

    #[test]
    fn test_gae_with_values() {
        // delta = [1 + 0.5*2 - 1, 1 - 2] = [1, -1]; A0 = 1 + 0.5*0.5*(-1)
        let adv = gae(&[1.0, 1.0], &[1.0, 2.0], 0.5, 0.5).unwrap();
        assert_all_close(&adv, &[0.75, -1.0]);
    }

    #[test]
    fn test_gae_length_mismatch() {
        assert!(gae(&[1.0, 1.0], &[0.0], 0.9, 0.9).is_err());
    }

    #[test]
    fn test_annotate_fills_every_transition() {
        let device = Default::default();
        let value_fn = MlpValueFunctionConfig::new(2)
            .with_hidden_dim(4)
            .init::<TestBackend>(&device);

        let steps = |n: usize| -> Trajectory {
            (0..n)
                .map(|i| {
                    Transition::new(
                        vec![i as f32, 1.0],
                        Action::Discrete(0),
                        1.0,
                        vec![i as f32 + 1.0, 1.0],
                        i + 1 == n,
                    )
                })
                .collect::<Vec<_>>()
                .into()
        };
        let mut trajectories = vec![steps(3), steps(1)];

        annotate(&mut trajectories, &value_fn, 0.9, 0.95, &device).unwrap();

        for trajectory in &trajectories {
            for t in trajectory.transitions() {
                assert!(t.estimated_value.is_some());
                assert!(t.advantage.is_some());
            }
        }
        let returns: Vec<f32> = trajectories[0]
            .transitions()
            .iter()
            .map(|t| t.discounted_return.unwrap())
            .collect();
        assert_all_close(&returns, &[2.71, 1.9, 1.0]);
    }
}
