//! Policy Update Loop
//!
//! Full-batch trust-region epochs against a frozen snapshot of the policy,
//! with KL early stopping and adaptive coefficient control afterwards.

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use tracing::{debug, warn};

use super::coefficients::AdaptiveCoefficients;
use super::objective::SurrogateObjective;
use super::optimizer::GradientStep;
use crate::core::tensor::{rows_to_tensor, scalar, vec_to_tensor};
use crate::error::{PpoError, Result};
use crate::memory::FlattenedBatch;
use crate::networks::{ActionDistribution, DistInfo, ParamSharing, StochasticPolicy};

/// An epoch stops the loop when its KL exceeds this multiple of the target
pub const EARLY_STOP_KL_FACTOR: f32 = 4.0;

/// Diagnostics of one epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub loss: f32,
    pub kl: f32,
    pub entropy: f32,
}

/// Result of one policy update
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolicyUpdateStats {
    pub average_loss: f32,
    pub average_kl: f32,
    pub average_entropy: f32,
    /// Epochs actually run
    pub epochs: usize,
    /// KL of the last epoch run
    pub final_kl: f32,
}

impl PolicyUpdateStats {
    fn from_history(history: &[EpochStats]) -> Self {
        let n = history.len();
        if n == 0 {
            return Self::default();
        }
        let mean = |f: fn(&EpochStats) -> f32| history.iter().map(f).sum::<f32>() / n as f32;

        Self {
            average_loss: mean(|e| e.loss),
            average_kl: mean(|e| e.kl),
            average_entropy: mean(|e| e.entropy),
            epochs: n,
            final_kl: history[n - 1].kl,
        }
    }
}

/// Run up to `train_iter` epochs, stopping right after the first epoch whose
/// KL exceeds `EARLY_STOP_KL_FACTOR * kl_target`.
pub fn run_epochs<F>(train_iter: usize, kl_target: f32, mut epoch: F) -> Result<Vec<EpochStats>>
where
    F: FnMut(usize) -> Result<EpochStats>,
{
    let mut history = Vec::with_capacity(train_iter);

    for e in 0..train_iter {
        let stats = epoch(e)?;
        debug!(
            epoch = e,
            loss = stats.loss,
            kl = stats.kl,
            entropy = stats.entropy,
            "Policy epoch"
        );
        history.push(stats);

        if stats.kl > EARLY_STOP_KL_FACTOR * kl_target {
            warn!(
                epoch = e,
                kl = stats.kl,
                kl_target,
                "KL divergence too large, stopping policy update early"
            );
            break;
        }
    }

    Ok(history)
}

/// Trust-region update of a stochastic policy
pub struct PolicyUpdater<B: AutodiffBackend, P: StochasticPolicy<B> + AutodiffModule<B>> {
    /// Independent copy holding the pre-update parameters
    old_policy: P,
    optimizer: Box<dyn GradientStep<B, P>>,
    objective: SurrogateObjective,
    base_lr: f64,
    l2_reg: f32,
    device: B::Device,
}

impl<B, P> PolicyUpdater<B, P>
where
    B: AutodiffBackend,
    P: StochasticPolicy<B> + AutodiffModule<B>,
{
    pub fn new(
        policy: &P,
        optimizer: Box<dyn GradientStep<B, P>>,
        objective: SurrogateObjective,
        base_lr: f64,
        l2_reg: f32,
        device: B::Device,
    ) -> Self {
        Self {
            old_policy: policy.make_copy(ParamSharing::Independent, &device),
            optimizer,
            objective,
            base_lr,
            l2_reg,
            device,
        }
    }

    /// Load the current parameters into the old policy and evaluate its
    /// frozen distribution on the batch.
    fn snapshot(&mut self, policy: &P, states: Tensor<B, 2>) -> Result<P::Dist> {
        self.old_policy = self
            .old_policy
            .clone()
            .load_record(policy.clone().into_record())
            .no_grad();

        let batch_size = states.dims()[0];
        let dist = self.old_policy.distribution(states).detach();
        check_outputs(&self.old_policy.dist_info(), &dist.outputs(), batch_size)?;
        Ok(dist)
    }

    /// Update `policy` in place on `batch` and adapt `coefficients` from the
    /// KL the update ended with.
    pub fn update(
        &mut self,
        policy: &mut P,
        batch: &FlattenedBatch,
        train_iter: usize,
        coefficients: &mut AdaptiveCoefficients,
    ) -> Result<PolicyUpdateStats> {
        let states = rows_to_tensor::<B>(
            &batch.states(),
            policy.observation_dim(),
            "observation",
            &self.device,
        )?;
        let actions = rows_to_tensor::<B>(
            &batch.actions(),
            policy.action_space().width(),
            "action",
            &self.device,
        )?;
        let advantages = vec_to_tensor::<B>(&batch.advantages(), &self.device);

        let old_dist = self.snapshot(policy, states.clone())?;

        let snapshot_coefficients = *coefficients;
        let lr = self.base_lr * snapshot_coefficients.lr_multiplier as f64;
        let objective = self.objective;
        let l2_reg = self.l2_reg;
        let optimizer = &mut self.optimizer;

        let history = run_epochs(train_iter, snapshot_coefficients.kl_target, |_| {
            let dist = policy.distribution(states.clone());
            let out = objective.loss(
                &dist,
                &old_dist,
                actions.clone(),
                advantages.clone(),
                &snapshot_coefficients,
            );

            let loss = if l2_reg > 0.0 {
                out.loss + policy.weight_penalty() * l2_reg
            } else {
                out.loss
            };

            let stats = EpochStats {
                loss: scalar(loss.clone()),
                kl: scalar(out.kl),
                entropy: scalar(out.entropy),
            };

            *policy = optimizer.step(policy.clone(), loss, lr);
            Ok(stats)
        })?;

        let stats = PolicyUpdateStats::from_history(&history);
        // No epoch, no measured KL
        if stats.epochs > 0 {
            coefficients.adapt(stats.final_kl);
        }
        Ok(stats)
    }
}

/// Check a snapshot's named outputs against what the policy declares
fn check_outputs(
    declared: &[DistInfo],
    outputs: &[(&'static str, [usize; 2])],
    batch_size: usize,
) -> Result<()> {
    if declared.len() != outputs.len() {
        return Err(PpoError::shape(
            "distribution outputs",
            declared.len(),
            outputs.len(),
        ));
    }

    for &(name, [rows, width]) in outputs {
        let info = declared
            .iter()
            .find(|info| info.name == name)
            .ok_or_else(|| PpoError::UndeclaredOutput(name.to_string()))?;
        if rows != batch_size {
            return Err(PpoError::shape(format!("{name} rows"), batch_size, rows));
        }
        let expected: usize = info.shape.iter().product();
        if width != expected {
            return Err(PpoError::shape(name, expected, width));
        }
    }

    Ok(())
}
