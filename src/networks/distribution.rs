//! Action Distributions
//!
//! Batched diagonal Gaussian and categorical distributions produced by the
//! policy networks. Every method works row-wise: one distribution per
//! observation in the batch.

use burn::prelude::*;
use burn::tensor::activation::log_softmax;
use burn::tensor::Distribution;

const LN_2PI: f32 = 1.837_877_1;

/// Batched action distribution
pub trait ActionDistribution<B: Backend>: Clone + Sized {
    /// Log-likelihood of `actions` (`[batch, action_width]`), one value per row
    fn log_prob(&self, actions: Tensor<B, 2>) -> Tensor<B, 1>;

    /// KL(self ‖ other), one value per row
    fn kl(&self, other: &Self) -> Tensor<B, 1>;

    /// Differential (or Shannon) entropy, one value per row
    fn entropy(&self) -> Tensor<B, 1>;

    /// Draw one action per row
    fn sample(&self) -> Tensor<B, 2>;

    /// Most likely action per row
    fn mode(&self) -> Tensor<B, 2>;

    /// Cut the distribution out of the autodiff graph
    fn detach(self) -> Self;

    /// Named output tensors with their `[batch, width]` shapes
    fn outputs(&self) -> Vec<(&'static str, [usize; 2])>;
}

/// Diagonal Gaussian parameterized by mean and log-variance
#[derive(Debug, Clone)]
pub struct DiagGaussian<B: Backend> {
    /// `[batch, dim]`
    pub mean: Tensor<B, 2>,
    /// `[batch, dim]`
    pub log_var: Tensor<B, 2>,
}

impl<B: Backend> DiagGaussian<B> {
    pub fn new(mean: Tensor<B, 2>, log_var: Tensor<B, 2>) -> Self {
        Self { mean, log_var }
    }

    fn dim(&self) -> usize {
        self.mean.dims()[1]
    }
}

impl<B: Backend> ActionDistribution<B> for DiagGaussian<B> {
    fn log_prob(&self, actions: Tensor<B, 2>) -> Tensor<B, 1> {
        let k = self.dim() as f32;
        let sq = (actions - self.mean.clone()).powf_scalar(2.0) / self.log_var.clone().exp();
        let per_row = sq.sum_dim(1) + self.log_var.clone().sum_dim(1);
        (per_row.add_scalar(k * LN_2PI) * -0.5).squeeze::<1>(1)
    }

    fn kl(&self, other: &Self) -> Tensor<B, 1> {
        let k = self.dim() as f32;
        let log_det = (other.log_var.clone() - self.log_var.clone()).sum_dim(1);
        let trace = (self.log_var.clone() - other.log_var.clone()).exp().sum_dim(1);
        let quad = ((other.mean.clone() - self.mean.clone()).powf_scalar(2.0)
            / other.log_var.clone().exp())
        .sum_dim(1);
        ((log_det + trace + quad).sub_scalar(k) * 0.5).squeeze::<1>(1)
    }

    fn entropy(&self) -> Tensor<B, 1> {
        let k = self.dim() as f32;
        (self.log_var.clone().sum_dim(1).add_scalar(k * (LN_2PI + 1.0)) * 0.5).squeeze::<1>(1)
    }

    fn sample(&self) -> Tensor<B, 2> {
        let noise = Tensor::random(
            self.mean.dims(),
            Distribution::Normal(0.0, 1.0),
            &self.mean.device(),
        );
        self.mean.clone() + (self.log_var.clone() * 0.5).exp() * noise
    }

    fn mode(&self) -> Tensor<B, 2> {
        self.mean.clone()
    }

    fn detach(self) -> Self {
        Self {
            mean: self.mean.detach(),
            log_var: self.log_var.detach(),
        }
    }

    fn outputs(&self) -> Vec<(&'static str, [usize; 2])> {
        vec![("mean", self.mean.dims()), ("log_var", self.log_var.dims())]
    }
}

/// Categorical distribution over `n` actions, parameterized by logits
#[derive(Debug, Clone)]
pub struct Categorical<B: Backend> {
    /// `[batch, n]`
    pub logits: Tensor<B, 2>,
}

impl<B: Backend> Categorical<B> {
    pub fn new(logits: Tensor<B, 2>) -> Self {
        Self { logits }
    }

    fn log_probs(&self) -> Tensor<B, 2> {
        log_softmax(self.logits.clone(), 1)
    }
}

impl<B: Backend> ActionDistribution<B> for Categorical<B> {
    /// `actions` holds the chosen index as a float in a single column
    fn log_prob(&self, actions: Tensor<B, 2>) -> Tensor<B, 1> {
        let indices = actions.int();
        self.log_probs().gather(1, indices).squeeze::<1>(1)
    }

    fn kl(&self, other: &Self) -> Tensor<B, 1> {
        let log_p = self.log_probs();
        let log_q = other.log_probs();
        (log_p.clone().exp() * (log_p - log_q)).sum_dim(1).squeeze::<1>(1)
    }

    fn entropy(&self) -> Tensor<B, 1> {
        let log_p = self.log_probs();
        (log_p.clone().exp() * log_p).sum_dim(1).neg().squeeze::<1>(1)
    }

    fn sample(&self) -> Tensor<B, 2> {
        // Gumbel-max trick
        let uniform: Tensor<B, 2> = Tensor::random(
            self.logits.dims(),
            Distribution::Uniform(1e-7, 1.0),
            &self.logits.device(),
        );
        let gumbel = uniform.log().neg().clamp_min(1e-12).log().neg();
        (self.logits.clone() + gumbel).argmax(1).float()
    }

    fn mode(&self) -> Tensor<B, 2> {
        self.logits.clone().argmax(1).float()
    }

    fn detach(self) -> Self {
        Self {
            logits: self.logits.detach(),
        }
    }

    fn outputs(&self) -> Vec<(&'static str, [usize; 2])> {
        vec![("logits", self.logits.dims())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tensor::{rows_to_tensor, tensor_to_vec};
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn gaussian(mean: Vec<Vec<f32>>, log_var: Vec<Vec<f32>>) -> DiagGaussian<TestBackend> {
        let device = Default::default();
        let width = mean[0].len();
        DiagGaussian::new(
            rows_to_tensor(&mean, width, "mean", &device).unwrap(),
            rows_to_tensor(&log_var, width, "log_var", &device).unwrap(),
        )
    }

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{a} != {b}");
    }

    #[test]
    fn test_standard_normal_log_prob() {
        let device = Default::default();
        let dist = gaussian(vec![vec![0.0]], vec![vec![0.0]]);
        let actions = rows_to_tensor(&[vec![0.0]], 1, "action", &device).unwrap();
        let lp = tensor_to_vec(dist.log_prob(actions));
        assert_close(lp[0], -0.5 * LN_2PI);
    }

    #[test]
    fn test_gaussian_kl() {
        let p = gaussian(vec![vec![0.0, 0.0]], vec![vec![0.0, 0.0]]);
        let q = gaussian(vec![vec![1.0, 0.0]], vec![vec![0.0, 0.0]]);

        assert_close(tensor_to_vec(p.kl(&p))[0], 0.0);
        // Unit variances: KL = 0.5 * |mu_p - mu_q|^2
        assert_close(tensor_to_vec(p.kl(&q))[0], 0.5);

        // Variance change only: 0.5 * (ln 2 + 1/2 - 1) per dim
        let r = gaussian(vec![vec![0.0, 0.0]], vec![vec![2f32.ln(), 2f32.ln()]]);
        let expected = 2.0 * 0.5 * (2f32.ln() + 0.5 - 1.0);
        assert_close(tensor_to_vec(p.kl(&r))[0], expected);
    }

    #[test]
    fn test_gaussian_entropy() {
        let dist = gaussian(vec![vec![3.0]], vec![vec![0.0]]);
        assert_close(tensor_to_vec(dist.entropy())[0], 0.5 * (LN_2PI + 1.0));
    }

    #[test]
    fn test_categorical_math() {
        let device = Default::default();
        let uniform = Categorical::<TestBackend>::new(
            rows_to_tensor(&[vec![0.0, 0.0, 0.0, 0.0]], 4, "logits", &device).unwrap(),
        );
        assert_close(tensor_to_vec(uniform.entropy())[0], 4f32.ln());

        let actions = rows_to_tensor(&[vec![2.0]], 1, "action", &device).unwrap();
        assert_close(tensor_to_vec(uniform.log_prob(actions))[0], -(4f32.ln()));

        let peaked = Categorical::<TestBackend>::new(
            rows_to_tensor(&[vec![5.0, 0.0, 0.0, 0.0]], 4, "logits", &device).unwrap(),
        );
        assert_close(tensor_to_vec(uniform.kl(&uniform))[0], 0.0);
        assert!(tensor_to_vec(uniform.kl(&peaked))[0] > 0.0);
        assert_eq!(tensor_to_vec(peaked.mode().squeeze::<1>(1)), vec![0.0]);
    }

    #[test]
    fn test_categorical_samples_in_range() {
        let device = Default::default();
        let rows = vec![vec![0.1, 0.2, 0.3]; 64];
        let dist = Categorical::<TestBackend>::new(rows_to_tensor(&rows, 3, "logits", &device).unwrap());
        for a in tensor_to_vec(dist.sample().squeeze::<1>(1)) {
            assert!(a == 0.0 || a == 1.0 || a == 2.0);
        }
    }

    #[test]
    fn test_outputs() {
        let dist = gaussian(vec![vec![0.0; 3]; 2], vec![vec![0.0; 3]; 2]);
        assert_eq!(dist.outputs(), vec![("mean", [2, 3]), ("log_var", [2, 3])]);
    }
}
