//! Gradient Step
//!
//! The descent step the update loops drive: consume a scalar loss and a
//! module, return the module after one optimizer step.

use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

/// One gradient-descent step on a module
pub trait GradientStep<B: AutodiffBackend, M: AutodiffModule<B>> {
    /// Backpropagate `loss` and apply one step with learning rate `lr`
    fn step(&mut self, module: M, loss: Tensor<B, 1>, lr: f64) -> M;
}

/// Adapter from any burn optimizer
pub struct BurnOptimizer<O> {
    optimizer: O,
}

impl<O> BurnOptimizer<O> {
    pub fn new(optimizer: O) -> Self {
        Self { optimizer }
    }
}

impl<B, M, O> GradientStep<B, M> for BurnOptimizer<O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    fn step(&mut self, module: M, loss: Tensor<B, 1>, lr: f64) -> M {
        let grads = GradientsParams::from_grads(loss.backward(), &module);
        self.optimizer.step(lr, module, grads)
    }
}

/// Adam with the epsilon commonly used for policy-gradient training
pub fn adam<B, M>() -> Box<dyn GradientStep<B, M>>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    Box::new(BurnOptimizer::new(
        AdamConfig::new().with_epsilon(1e-5).init::<B, M>(),
    ))
}
