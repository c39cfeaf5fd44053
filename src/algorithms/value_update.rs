//! Value Function Update Loop
//!
//! Mini-batch regression of V(s) on discounted returns over a replay that
//! accumulates every batch ever trained on.

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

use super::optimizer::GradientStep;
use crate::core::tensor::{rows_to_tensor, scalar, tensor_to_vec, vec_to_tensor};
use crate::error::Result;
use crate::memory::FlattenedBatch;
use crate::networks::ValueFunction;

/// Target variance below which explained variance is reported as zero
const MIN_TARGET_VARIANCE: f64 = 1e-12;

/// Result of one value function update
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValueUpdateStats {
    /// Mean squared error over the whole replay after training
    pub loss: f32,
    /// Explained variance after training
    pub exp_var: f32,
    /// Explained variance before training
    pub old_exp_var: f32,
}

/// `1 - Var(targets - predictions) / Var(targets)`, or 0 when the targets
/// have no variance.
pub fn explained_variance(targets: &[f32], predictions: &[f32]) -> f32 {
    let n = targets.len();
    if n == 0 || predictions.len() != n {
        return 0.0;
    }

    let targets: Vec<f64> = targets.iter().map(|&t| t as f64).collect();
    let target_var = population_variance(&targets);
    if target_var < MIN_TARGET_VARIANCE {
        warn!(target_var, "Degenerate return variance, explained variance set to 0");
        return 0.0;
    }

    let residuals: Vec<f64> = targets
        .iter()
        .zip(predictions)
        .map(|(&t, &p)| t - p as f64)
        .collect();
    let residual_var = population_variance(&residuals);

    (1.0 - residual_var / target_var) as f32
}

fn population_variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Regression loop for a value function
pub struct ValueUpdater<B: AutodiffBackend, V: ValueFunction<B> + AutodiffModule<B>> {
    /// Every batch trained on so far; `None` before the first update
    replay: Option<FlattenedBatch>,
    optimizer: Box<dyn GradientStep<B, V>>,
    lr: f64,
    batch_size: usize,
    l2_reg: f32,
    rng: StdRng,
    device: B::Device,
}

impl<B, V> ValueUpdater<B, V>
where
    B: AutodiffBackend,
    V: ValueFunction<B> + AutodiffModule<B>,
{
    pub fn new(
        optimizer: Box<dyn GradientStep<B, V>>,
        lr: f64,
        batch_size: usize,
        l2_reg: f32,
        seed: u64,
        device: B::Device,
    ) -> Self {
        Self {
            replay: None,
            optimizer,
            lr,
            batch_size,
            l2_reg,
            rng: StdRng::seed_from_u64(seed),
            device,
        }
    }

    /// Number of transitions in the replay
    pub fn replay_len(&self) -> usize {
        self.replay.as_ref().map_or(0, FlattenedBatch::len)
    }

    /// Add `batch` to the replay and train `value_fn` for `train_iter` epochs
    /// over the whole replay.
    pub fn update(
        &mut self,
        value_fn: &mut V,
        batch: &FlattenedBatch,
        train_iter: usize,
    ) -> Result<ValueUpdateStats> {
        match self.replay.as_mut() {
            Some(replay) => replay.union(batch),
            None => self.replay = Some(batch.clone()),
        }
        let Some(replay) = self.replay.as_ref() else {
            return Ok(ValueUpdateStats::default());
        };

        let obs_dim = value_fn.observation_dim();
        let states = replay.states();
        let returns = replay.discounted_returns();
        let all_states = rows_to_tensor::<B>(&states, obs_dim, "observation", &self.device)?;

        let predictions = tensor_to_vec(value_fn.forward(all_states.clone()).detach());
        let old_exp_var = explained_variance(&returns, &predictions);

        for epoch in 0..train_iter {
            let mut epoch_loss = 0.0f32;
            let chunks = replay.minibatch_indices(self.batch_size, &mut self.rng);
            let num_chunks = chunks.len();

            for chunk in chunks {
                let rows: Vec<Vec<f32>> = chunk.iter().map(|&i| states[i].clone()).collect();
                let targets: Vec<f32> = chunk.iter().map(|&i| returns[i]).collect();

                let x = rows_to_tensor::<B>(&rows, obs_dim, "observation", &self.device)?;
                let y = vec_to_tensor::<B>(&targets, &self.device);

                let mse = (value_fn.forward(x) - y).powf_scalar(2.0).mean();
                let loss = if self.l2_reg > 0.0 {
                    mse + value_fn.weight_penalty() * self.l2_reg
                } else {
                    mse
                };
                epoch_loss += scalar(loss.clone());

                *value_fn = self.optimizer.step(value_fn.clone(), loss, self.lr);
            }

            debug!(
                epoch,
                loss = epoch_loss / num_chunks.max(1) as f32,
                "Value function epoch"
            );
        }

        let predictions = tensor_to_vec(value_fn.forward(all_states).detach());
        let exp_var = explained_variance(&returns, &predictions);
        let loss = returns
            .iter()
            .zip(&predictions)
            .map(|(r, p)| (r - p).powi(2))
            .sum::<f32>()
            / returns.len().max(1) as f32;

        Ok(ValueUpdateStats {
            loss,
            exp_var,
            old_exp_var,
        })
    }
}
