//! Policy Networks
//!
//! Stochastic MLP policies over continuous (diagonal Gaussian) and discrete
//! (categorical) action spaces.

use burn::module::Param;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;

use super::distribution::{ActionDistribution, Categorical, DiagGaussian};
use super::encoder::{squared_weights, MlpEncoder, MlpEncoderConfig, DEFAULT_HIDDEN_DIM};
use crate::core::ActionSpace;

/// How a policy copy relates to its source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSharing {
    /// Same parameter values and identities as the source
    Shared,
    /// Freshly initialized parameters with the same architecture
    Independent,
}

/// Description of one named distribution output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistInfo {
    pub name: &'static str,
    pub dtype: &'static str,
    /// Per-observation shape
    pub shape: Vec<usize>,
}

impl DistInfo {
    fn float(name: &'static str, width: usize) -> Self {
        Self {
            name,
            dtype: "float32",
            shape: vec![width],
        }
    }
}

/// Stochastic policy capability
pub trait StochasticPolicy<B: Backend>: Module<B> {
    type Dist: ActionDistribution<B>;

    /// Action distribution for a batch of normalized observations
    fn distribution(&self, states: Tensor<B, 2>) -> Self::Dist;

    /// Named outputs of [`Self::distribution`]
    fn dist_info(&self) -> Vec<DistInfo>;

    fn action_space(&self) -> ActionSpace;

    fn observation_dim(&self) -> usize;

    /// Copy this policy with the given parameter sharing mode
    fn make_copy(&self, sharing: ParamSharing, device: &B::Device) -> Self;

    /// Sum of squared weights, used for L2 regularization
    fn weight_penalty(&self) -> Tensor<B, 1>;

    /// Sample one action per observation
    fn forward(&self, states: Tensor<B, 2>) -> Tensor<B, 2> {
        self.distribution(states).sample()
    }
}

/// Gaussian policy configuration
#[derive(Config, Debug)]
pub struct GaussianMlpPolicyConfig {
    pub observation_dim: usize,
    pub action_dim: usize,
    #[config(default = "DEFAULT_HIDDEN_DIM")]
    pub hidden_dim: usize,
    /// Initial log-variance of every action component
    #[config(default = "-1.0")]
    pub init_log_var: f32,
}

/// Diagonal Gaussian policy with state-independent log-variance
#[derive(Module, Debug)]
pub struct GaussianMlpPolicy<B: Backend> {
    encoder: MlpEncoder<B>,
    mean_head: Linear<B>,
    log_var: Param<Tensor<B, 1>>,
    observation_dim: usize,
    action_dim: usize,
    hidden_dim: usize,
    init_log_var: f32,
}

impl GaussianMlpPolicyConfig {
    /// Initialize the policy network
    pub fn init<B: Backend>(&self, device: &B::Device) -> GaussianMlpPolicy<B> {
        let encoder = MlpEncoderConfig::new(self.observation_dim)
            .with_hidden_dim(self.hidden_dim)
            .init(device);
        let mean_head = LinearConfig::new(self.hidden_dim, self.action_dim).init(device);
        let log_var = Tensor::full([self.action_dim], self.init_log_var, device);

        GaussianMlpPolicy {
            encoder,
            mean_head,
            log_var: Param::from_tensor(log_var),
            observation_dim: self.observation_dim,
            action_dim: self.action_dim,
            hidden_dim: self.hidden_dim,
            init_log_var: self.init_log_var,
        }
    }
}

impl<B: Backend> StochasticPolicy<B> for GaussianMlpPolicy<B> {
    type Dist = DiagGaussian<B>;

    fn distribution(&self, states: Tensor<B, 2>) -> DiagGaussian<B> {
        let mean = self.mean_head.forward(self.encoder.forward(states));
        // Broadcast the shared log-variance over the batch
        let log_var = mean.zeros_like() + self.log_var.val().unsqueeze::<2>();
        DiagGaussian::new(mean, log_var)
    }

    fn dist_info(&self) -> Vec<DistInfo> {
        vec![
            DistInfo::float("mean", self.action_dim),
            DistInfo::float("log_var", self.action_dim),
        ]
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::Continuous {
            dim: self.action_dim,
        }
    }

    fn observation_dim(&self) -> usize {
        self.observation_dim
    }

    fn make_copy(&self, sharing: ParamSharing, device: &B::Device) -> Self {
        match sharing {
            ParamSharing::Shared => self.clone(),
            ParamSharing::Independent => GaussianMlpPolicyConfig::new(self.observation_dim, self.action_dim)
                .with_hidden_dim(self.hidden_dim)
                .with_init_log_var(self.init_log_var)
                .init(device),
        }
    }

    fn weight_penalty(&self) -> Tensor<B, 1> {
        self.encoder.squared_weights() + squared_weights(&self.mean_head)
    }
}

/// Categorical policy configuration
#[derive(Config, Debug)]
pub struct CategoricalMlpPolicyConfig {
    pub observation_dim: usize,
    pub num_actions: usize,
    #[config(default = "DEFAULT_HIDDEN_DIM")]
    pub hidden_dim: usize,
}

/// Softmax policy over a discrete action set
#[derive(Module, Debug)]
pub struct CategoricalMlpPolicy<B: Backend> {
    encoder: MlpEncoder<B>,
    logits_head: Linear<B>,
    observation_dim: usize,
    num_actions: usize,
    hidden_dim: usize,
}

impl CategoricalMlpPolicyConfig {
    /// Initialize the policy network
    pub fn init<B: Backend>(&self, device: &B::Device) -> CategoricalMlpPolicy<B> {
        CategoricalMlpPolicy {
            encoder: MlpEncoderConfig::new(self.observation_dim)
                .with_hidden_dim(self.hidden_dim)
                .init(device),
            logits_head: LinearConfig::new(self.hidden_dim, self.num_actions).init(device),
            observation_dim: self.observation_dim,
            num_actions: self.num_actions,
            hidden_dim: self.hidden_dim,
        }
    }
}

impl<B: Backend> StochasticPolicy<B> for CategoricalMlpPolicy<B> {
    type Dist = Categorical<B>;

    fn distribution(&self, states: Tensor<B, 2>) -> Categorical<B> {
        Categorical::new(self.logits_head.forward(self.encoder.forward(states)))
    }

    fn dist_info(&self) -> Vec<DistInfo> {
        vec![DistInfo::float("logits", self.num_actions)]
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::Discrete {
            n: self.num_actions,
        }
    }

    fn observation_dim(&self) -> usize {
        self.observation_dim
    }

    fn make_copy(&self, sharing: ParamSharing, device: &B::Device) -> Self {
        match sharing {
            ParamSharing::Shared => self.clone(),
            ParamSharing::Independent => {
                CategoricalMlpPolicyConfig::new(self.observation_dim, self.num_actions)
                    .with_hidden_dim(self.hidden_dim)
                    .init(device)
            }
        }
    }

    fn weight_penalty(&self) -> Tensor<B, 1> {
        self.encoder.squared_weights() + squared_weights(&self.logits_head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tensor::tensor_to_vec;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_gaussian_policy_shapes() {
        let device = Default::default();
        let policy = GaussianMlpPolicyConfig::new(4, 2)
            .with_hidden_dim(8)
            .init::<TestBackend>(&device);

        let states = Tensor::<TestBackend, 2>::zeros([5, 4], &device);
        let dist = policy.distribution(states.clone());
        assert_eq!(dist.outputs(), vec![("mean", [5, 2]), ("log_var", [5, 2])]);
        assert_eq!(policy.forward(states).dims(), [5, 2]);

        let log_var = tensor_to_vec(dist.log_var.clone().flatten::<1>(0, 1));
        assert!(log_var.iter().all(|&v| (v + 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_categorical_policy_shapes() {
        let device = Default::default();
        let policy = CategoricalMlpPolicyConfig::new(3, 4).init::<TestBackend>(&device);

        let states = Tensor::<TestBackend, 2>::ones([2, 3], &device);
        assert_eq!(policy.distribution(states.clone()).outputs(), vec![("logits", [2, 4])]);
        assert_eq!(policy.forward(states).dims(), [2, 1]);
        assert_eq!(policy.action_space(), ActionSpace::Discrete { n: 4 });
    }

    #[test]
    fn test_make_copy_sharing_modes() {
        let device = Default::default();
        let policy = GaussianMlpPolicyConfig::new(3, 1).init::<TestBackend>(&device);
        let states = Tensor::<TestBackend, 2>::ones([1, 3], &device);
        let mean = |p: &GaussianMlpPolicy<TestBackend>| {
            tensor_to_vec(p.distribution(states.clone()).mean.flatten::<1>(0, 1))
        };

        let shared = policy.make_copy(ParamSharing::Shared, &device);
        assert_eq!(mean(&shared), mean(&policy));

        let independent = policy.make_copy(ParamSharing::Independent, &device);
        assert_eq!(independent.dist_info(), policy.dist_info());
        assert_ne!(mean(&independent), mean(&policy));

        let restored = independent.load_record(policy.clone().into_record());
        assert_eq!(mean(&restored), mean(&policy));
    }
}
