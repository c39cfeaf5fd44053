//! Observation Encoder
//!
//! Two-layer MLP trunk shared by the policy and value networks.

use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;

/// Default hidden width
pub const DEFAULT_HIDDEN_DIM: usize = 64;

/// Encoder configuration
#[derive(Config, Debug)]
pub struct MlpEncoderConfig {
    /// Input dimension (normalized observation)
    pub input_dim: usize,
    /// Hidden and output width
    #[config(default = "DEFAULT_HIDDEN_DIM")]
    pub hidden_dim: usize,
}

/// Observation encoder
#[derive(Module, Debug)]
pub struct MlpEncoder<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    activation: Relu,
}

impl MlpEncoderConfig {
    /// Initialize the encoder network
    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpEncoder<B> {
        MlpEncoder {
            fc1: LinearConfig::new(self.input_dim, self.hidden_dim).init(device),
            fc2: LinearConfig::new(self.hidden_dim, self.hidden_dim).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> MlpEncoder<B> {
    /// Forward pass through the encoder
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.activation.forward(self.fc1.forward(x));
        self.activation.forward(self.fc2.forward(x))
    }

    /// Sum of squared weights of both layers
    pub fn squared_weights(&self) -> Tensor<B, 1> {
        squared_weights(&self.fc1) + squared_weights(&self.fc2)
    }
}

/// Sum of squared weights of a single linear layer
pub fn squared_weights<B: Backend>(layer: &Linear<B>) -> Tensor<B, 1> {
    layer.weight.val().powf_scalar(2.0).sum()
}
