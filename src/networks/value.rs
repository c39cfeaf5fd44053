//! Value Function Network
//!
//! State-value approximator V(s) trained by regression on discounted returns.

use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;

use super::encoder::{squared_weights, MlpEncoder, MlpEncoderConfig, DEFAULT_HIDDEN_DIM};

/// State-value capability
pub trait ValueFunction<B: Backend>: Module<B> {
    /// One scalar per observation
    fn forward(&self, states: Tensor<B, 2>) -> Tensor<B, 1>;

    fn observation_dim(&self) -> usize;

    /// Sum of squared weights, used for L2 regularization
    fn weight_penalty(&self) -> Tensor<B, 1>;
}

/// Value function configuration
#[derive(Config, Debug)]
pub struct MlpValueFunctionConfig {
    pub observation_dim: usize,
    #[config(default = "DEFAULT_HIDDEN_DIM")]
    pub hidden_dim: usize,
}

/// MLP value function
#[derive(Module, Debug)]
pub struct MlpValueFunction<B: Backend> {
    encoder: MlpEncoder<B>,
    value_head: Linear<B>,
    observation_dim: usize,
}

impl MlpValueFunctionConfig {
    /// Initialize the value network
    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpValueFunction<B> {
        MlpValueFunction {
            encoder: MlpEncoderConfig::new(self.observation_dim)
                .with_hidden_dim(self.hidden_dim)
                .init(device),
            value_head: LinearConfig::new(self.hidden_dim, 1).init(device),
            observation_dim: self.observation_dim,
        }
    }
}

impl<B: Backend> ValueFunction<B> for MlpValueFunction<B> {
    fn forward(&self, states: Tensor<B, 2>) -> Tensor<B, 1> {
        self.value_head
            .forward(self.encoder.forward(states))
            .squeeze::<1>(1)
    }

    fn observation_dim(&self) -> usize {
        self.observation_dim
    }

    fn weight_penalty(&self) -> Tensor<B, 1> {
        self.encoder.squared_weights() + squared_weights(&self.value_head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_value_forward() {
        let device = Default::default();
        let value_fn = MlpValueFunctionConfig::new(6)
            .with_hidden_dim(8)
            .init::<TestBackend>(&device);

        let states = Tensor::<TestBackend, 2>::zeros([3, 6], &device);
        assert_eq!(value_fn.forward(states).dims(), [3]);
    }
}
