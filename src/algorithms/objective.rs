//! Surrogate Objectives
//!
//! Policy loss modes. Exactly one is active per engine, chosen from the
//! configuration: a clipping range selects the clipped surrogate, its absence
//! the adaptive KL penalty.

use burn::prelude::*;

use super::coefficients::AdaptiveCoefficients;
use crate::config::PpoConfig;
use crate::networks::ActionDistribution;

/// Bound on |log pi_new - log pi_old| before exponentiation
const MAX_LOG_RATIO: f32 = 20.0;

/// Policy loss mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurrogateObjective {
    /// `-mean(min(A*rho, A*clip(rho, 1 - lower, 1 + upper)))`
    Clipped { lower: f32, upper: f32 },
    /// `-mean(A*rho) + beta*mean(KL) + eta*max(0, mean(KL) - 2*kl_target)^2`
    KlPenalty,
}

/// Loss of one policy epoch with its diagnostics
#[derive(Debug, Clone)]
pub struct PolicyLoss<B: Backend> {
    pub loss: Tensor<B, 1>,
    /// Mean KL(old ‖ new)
    pub kl: Tensor<B, 1>,
    /// Mean entropy of the new policy
    pub entropy: Tensor<B, 1>,
}

impl SurrogateObjective {
    pub fn from_config(config: &PpoConfig) -> Self {
        match config.clipping_range {
            Some([lower, upper]) => SurrogateObjective::Clipped { lower, upper },
            None => SurrogateObjective::KlPenalty,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SurrogateObjective::Clipped { .. } => "clipped_surrogate",
            SurrogateObjective::KlPenalty => "adaptive_kl_penalty",
        }
    }

    /// Loss of `new` against the frozen `old` distribution on one batch.
    ///
    /// `old` must already be detached from the autodiff graph.
    pub fn loss<B: Backend, D: ActionDistribution<B>>(
        &self,
        new: &D,
        old: &D,
        actions: Tensor<B, 2>,
        advantages: Tensor<B, 1>,
        coefficients: &AdaptiveCoefficients,
    ) -> PolicyLoss<B> {
        let log_ratio = new.log_prob(actions.clone()) - old.log_prob(actions);
        let ratio = log_ratio.clamp(-MAX_LOG_RATIO, MAX_LOG_RATIO).exp();

        let kl = old.kl(new).mean();
        let entropy = new.entropy().mean();

        let loss = match *self {
            SurrogateObjective::Clipped { lower, upper } => {
                let unclipped = advantages.clone() * ratio.clone();
                let clipped = advantages * ratio.clamp(1.0 - lower, 1.0 + upper);
                unclipped.min_pair(clipped).mean().neg()
            }
            SurrogateObjective::KlPenalty => {
                let surrogate = (advantages * ratio).mean().neg();
                let penalty = kl.clone() * coefficients.beta;
                let hinge = kl
                    .clone()
                    .sub_scalar(2.0 * coefficients.kl_target)
                    .clamp_min(0.0)
                    .powf_scalar(2.0)
                    * coefficients.eta;
                surrogate + penalty + hinge
            }
        };

        PolicyLoss { loss, kl, entropy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tensor::{rows_to_tensor, scalar, vec_to_tensor};
    use crate::networks::DiagGaussian;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn gaussian(means: &[f32]) -> DiagGaussian<TestBackend> {
        let device = Default::default();
        let rows: Vec<Vec<f32>> = means.iter().map(|&m| vec![m]).collect();
        let zeros: Vec<Vec<f32>> = means.iter().map(|_| vec![0.0]).collect();
        DiagGaussian::new(
            rows_to_tensor(&rows, 1, "mean", &device).unwrap(),
            rows_to_tensor(&zeros, 1, "log_var", &device).unwrap(),
        )
    }

    fn coefficients() -> AdaptiveCoefficients {
        AdaptiveCoefficients {
            beta: 2.0,
            eta: 10.0,
            lr_multiplier: 1.0,
            kl_target: 0.1,
        }
    }

    #[test]
    fn test_from_config() {
        let mut config = PpoConfig::default();
        assert_eq!(SurrogateObjective::from_config(&config), SurrogateObjective::KlPenalty);

        config.clipping_range = Some([0.2, 0.3]);
        assert_eq!(
            SurrogateObjective::from_config(&config),
            SurrogateObjective::Clipped { lower: 0.2, upper: 0.3 }
        );
    }

    #[test]
    fn test_identical_policies() {
        let device = Default::default();
        let dist = gaussian(&[0.0, 1.0]);
        let actions = rows_to_tensor(&[vec![0.5], vec![0.5]], 1, "action", &device).unwrap();
        let advantages = vec_to_tensor::<TestBackend>(&[1.0, -3.0], &device);

        for objective in [
            SurrogateObjective::KlPenalty,
            SurrogateObjective::Clipped { lower: 0.2, upper: 0.2 },
        ] {
            let out = objective.loss(&dist, &dist, actions.clone(), advantages.clone(), &coefficients());
            // rho = 1 and KL = 0, so the loss is -mean(A)
            assert!((scalar(out.loss) - 1.0).abs() < 1e-5);
            assert!(scalar(out.kl).abs() < 1e-6);
        }
    }

    #[test]
    fn test_kl_penalty_terms() {
        let device = Default::default();
        let old = gaussian(&[0.0]);
        let new = gaussian(&[1.0]);
        let actions = rows_to_tensor(&[vec![0.0]], 1, "action", &device).unwrap();
        let advantages = vec_to_tensor::<TestBackend>(&[0.0], &device);

        let out = SurrogateObjective::KlPenalty.loss(&new, &old, actions, advantages, &coefficients());
        // KL = 0.5; penalty = 2 * 0.5; hinge = 10 * (0.5 - 0.2)^2
        assert!((scalar(out.kl) - 0.5).abs() < 1e-5);
        assert!((scalar(out.loss) - (1.0 + 0.9)).abs() < 1e-4);
    }

    #[test]
    fn test_clipping_caps_positive_advantage() {
        let device = Default::default();
        let old = gaussian(&[0.0]);
        let new = gaussian(&[1.0]);
        // log rho = -0.5*(1-1)^2 + 0.5*(1-0)^2 = 0.5 at action 1.0
        let actions = rows_to_tensor(&[vec![1.0]], 1, "action", &device).unwrap();
        let advantages = vec_to_tensor::<TestBackend>(&[1.0], &device);

        let out = SurrogateObjective::Clipped { lower: 0.2, upper: 0.2 }.loss(
            &new,
            &old,
            actions,
            advantages,
            &coefficients(),
        );
        assert!((scalar(out.loss) + 1.2).abs() < 1e-5);
    }

    #[test]
    fn test_log_ratio_is_bounded() {
        let device = Default::default();
        let old = gaussian(&[0.0]);
        let new = gaussian(&[100.0]);
        // log rho = 5000 at the new mean, bounded to 20 before exponentiation
        let actions = rows_to_tensor(&[vec![100.0]], 1, "action", &device).unwrap();
        let advantages = vec_to_tensor::<TestBackend>(&[-1.0], &device);

        let out = SurrogateObjective::Clipped { lower: 0.2, upper: 0.2 }.loss(
            &new,
            &old,
            actions,
            advantages,
            &coefficients(),
        );
        let loss = scalar(out.loss);
        assert!(loss.is_finite());
        assert!((loss / MAX_LOG_RATIO.exp() - 1.0).abs() < 1e-4);
    }
}
