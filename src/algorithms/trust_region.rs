//! Trust-Region Optimizer
//!
//! The training engine. Owns the policy, the value function, the observation
//! scaler, the trajectory buffer and the adaptive coefficients, and runs one
//! full training round per `train` call:
//! advantages, policy update, value update, buffer reset.

use std::collections::BTreeMap;

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::advantage;
use super::coefficients::AdaptiveCoefficients;
use super::objective::SurrogateObjective;
use super::optimizer::{adam, GradientStep};
use super::policy_update::{PolicyUpdateStats, PolicyUpdater};
use super::value_update::{ValueUpdateStats, ValueUpdater};
use crate::config::PpoConfig;
use crate::core::tensor::{rows_to_tensor, tensor_to_rows};
use crate::core::{Action, RunningScaler, SampleBatch};
use crate::error::{PpoError, Result};
use crate::memory::{FlattenedBatch, Trajectory, TrajectoryBuffer};
use crate::networks::{ActionDistribution, StochasticPolicy, ValueFunction};

/// Floor for the advantage standard deviation
pub const ADVANTAGE_STD_FLOOR: f32 = 1e-8;

/// Metrics of one training round
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrainMetrics {
    pub policy: PolicyUpdateStats,
    pub value: ValueUpdateStats,
    /// Transitions trained on this round
    pub samples: usize,
}

impl TrainMetrics {
    /// Flat metric mapping
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("policy_average_loss".to_string(), self.policy.average_loss as f64);
        map.insert("policy_average_kl".to_string(), self.policy.average_kl as f64);
        map.insert(
            "policy_average_entropy".to_string(),
            self.policy.average_entropy as f64,
        );
        map.insert(
            "policy_total_train_epoch".to_string(),
            self.policy.epochs as f64,
        );
        map.insert("value_func_loss".to_string(), self.value.loss as f64);
        map.insert("value_func_policy_exp_var".to_string(), self.value.exp_var as f64);
        map.insert(
            "value_func_policy_old_exp_var".to_string(),
            self.value.old_exp_var as f64,
        );
        map
    }
}

/// Call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCounters {
    pub train: u64,
    pub predict: u64,
}

/// Serializable non-network state of an engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub coefficients: AdaptiveCoefficients,
    pub scaler: RunningScaler,
    pub counters: EngineCounters,
}

/// PPO / adaptive-KL trust-region training engine
pub struct TrustRegionOptimizer<B, P, V>
where
    B: AutodiffBackend,
    P: StochasticPolicy<B> + AutodiffModule<B>,
    V: ValueFunction<B> + AutodiffModule<B>,
{
    config: PpoConfig,
    policy: P,
    value_fn: V,
    policy_updater: PolicyUpdater<B, P>,
    value_updater: ValueUpdater<B, V>,
    coefficients: AdaptiveCoefficients,
    scaler: RunningScaler,
    buffer: TrajectoryBuffer,
    counters: EngineCounters,
    device: B::Device,
}

impl<B, P, V> TrustRegionOptimizer<B, P, V>
where
    B: AutodiffBackend,
    P: StochasticPolicy<B> + AutodiffModule<B> + 'static,
    V: ValueFunction<B> + AutodiffModule<B> + 'static,
{
    /// Create an engine with Adam optimizers for both networks
    pub fn new(config: PpoConfig, policy: P, value_fn: V, device: B::Device) -> Result<Self> {
        Self::with_optimizers(config, policy, value_fn, adam(), adam(), device)
    }

    /// Create an engine with caller-provided gradient steps
    pub fn with_optimizers(
        config: PpoConfig,
        policy: P,
        value_fn: V,
        policy_optimizer: Box<dyn GradientStep<B, P>>,
        value_optimizer: Box<dyn GradientStep<B, V>>,
        device: B::Device,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|errors| PpoError::InvalidConfig(errors.join("; ")))?;

        let obs_dim = policy.observation_dim();
        if value_fn.observation_dim() != obs_dim {
            return Err(PpoError::shape(
                "value function observation",
                obs_dim,
                value_fn.observation_dim(),
            ));
        }

        let objective = SurrogateObjective::from_config(&config);
        let policy_updater = PolicyUpdater::new(
            &policy,
            policy_optimizer,
            objective,
            config.policy_lr,
            config.policy_l2_reg,
            device.clone(),
        );
        let value_updater = ValueUpdater::new(
            value_optimizer,
            config.value_func_lr,
            config.value_func_train_batch_size,
            config.value_func_l2_reg,
            config.seed,
            device.clone(),
        );

        info!(
            objective = objective.name(),
            observation_dim = obs_dim,
            action_space = ?policy.action_space(),
            "Trust-region optimizer initialized"
        );

        Ok(Self {
            coefficients: AdaptiveCoefficients::from_config(&config),
            scaler: RunningScaler::new(obs_dim, config.scaler_epsilon),
            config,
            policy,
            value_fn,
            policy_updater,
            value_updater,
            buffer: TrajectoryBuffer::new(),
            counters: EngineCounters::default(),
            device,
        })
    }

    /// Normalize a batch of raw samples with the current scaler statistics,
    /// append it to the trajectory buffer, then fold the raw observations
    /// into the scaler.
    pub fn append_to_memory(&mut self, samples: &SampleBatch) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let action_space = self.policy.action_space();
        for sample in samples.iter() {
            action_space.check(&sample.action)?;
        }

        let raw_states: Vec<Vec<f32>> = samples.iter().map(|t| t.state.clone()).collect();
        let raw_next: Vec<Vec<f32>> = samples.iter().map(|t| t.new_state.clone()).collect();
        let states = self.scaler.process_batch(&raw_states)?;
        let next_states = self.scaler.process_batch(&raw_next)?;

        for ((sample, state), new_state) in samples.iter().zip(states).zip(next_states) {
            let mut transition = sample.clone();
            transition.state = state;
            transition.new_state = new_state;
            self.buffer.append(transition);
        }

        self.scaler.update(&raw_states)
    }

    /// Run one training round.
    ///
    /// Trains on `trajectory_data` when given (states must already be
    /// normalized), otherwise on the completed trajectories in the buffer.
    /// `train_iter` overrides both the policy and value epoch counts; zero
    /// falls back to the configured counts.
    /// The buffer is reset afterwards either way.
    pub fn train(
        &mut self,
        trajectory_data: Option<Vec<Trajectory>>,
        train_iter: Option<usize>,
    ) -> Result<TrainMetrics> {
        let mut trajectories: Vec<Trajectory> = match trajectory_data {
            Some(data) => data.into_iter().filter(|t| !t.is_empty()).collect(),
            None => self.buffer.completed().to_vec(),
        };
        if trajectories.is_empty() {
            return Err(PpoError::InsufficientData { trajectories: 0 });
        }

        advantage::annotate(
            &mut trajectories,
            &self.value_fn,
            self.config.gamma,
            self.config.lam,
            &self.device,
        )?;
        let mut batch = FlattenedBatch::from_trajectories(&trajectories);
        batch.normalize_advantages(ADVANTAGE_STD_FLOOR);

        let train_iter = train_iter.filter(|&n| n > 0);
        let policy = self.policy_updater.update(
            &mut self.policy,
            &batch,
            train_iter.unwrap_or(self.config.policy_train_iter),
            &mut self.coefficients,
        )?;
        let value = self.value_updater.update(
            &mut self.value_fn,
            &batch,
            train_iter.unwrap_or(self.config.value_func_train_iter),
        )?;

        self.buffer.reset();
        self.counters.train += 1;

        let metrics = TrainMetrics {
            policy,
            value,
            samples: batch.len(),
        };
        info!(
            round = self.counters.train,
            trajectories = trajectories.len(),
            samples = batch.len(),
            policy_loss = policy.average_loss,
            kl = policy.average_kl,
            entropy = policy.average_entropy,
            epochs = policy.epochs,
            value_loss = value.loss,
            exp_var = value.exp_var,
            old_exp_var = value.old_exp_var,
            beta = self.coefficients.beta,
            lr_multiplier = self.coefficients.lr_multiplier,
            "Training round complete"
        );

        Ok(metrics)
    }

    /// Sample an action for one raw observation
    pub fn predict(&mut self, observation: &[f32]) -> Result<Action> {
        self.counters.predict += 1;
        self.act(observation, |dist| dist.sample())
    }

    /// Most likely action for one raw observation
    pub fn predict_deterministic(&self, observation: &[f32]) -> Result<Action> {
        self.act(observation, |dist| dist.mode())
    }

    fn act<F>(&self, observation: &[f32], choose: F) -> Result<Action>
    where
        F: FnOnce(&P::Dist) -> burn::tensor::Tensor<B, 2>,
    {
        let normalized = self.scaler.process(observation)?;
        let states = rows_to_tensor::<B>(&[normalized], self.scaler.dim(), "observation", &self.device)?;
        let dist = self.policy.distribution(states).detach();
        let rows = tensor_to_rows(choose(&dist));
        let row = rows
            .first()
            .ok_or_else(|| PpoError::shape("sampled actions", 1, 0))?;
        self.policy.action_space().decode(row)
    }

    /// Read an adaptive coefficient by name
    pub fn parameter(&self, name: &str) -> Result<f32> {
        self.coefficients.get(name)
    }

    /// Overwrite an adaptive coefficient by name
    pub fn set_parameter(&mut self, name: &str, value: f32) -> Result<()> {
        self.coefficients.set(name, value)
    }

    pub fn coefficients(&self) -> &AdaptiveCoefficients {
        &self.coefficients
    }

    pub fn config(&self) -> &PpoConfig {
        &self.config
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: P) {
        self.policy = policy;
    }

    pub fn value_function(&self) -> &V {
        &self.value_fn
    }

    pub fn set_value_function(&mut self, value_fn: V) {
        self.value_fn = value_fn;
    }

    pub fn scaler(&self) -> &RunningScaler {
        &self.scaler
    }

    /// Completed trajectories waiting for the next `train` call
    pub fn buffered_trajectories(&self) -> usize {
        self.buffer.len()
    }

    /// Transitions accumulated in the value function replay
    pub fn replay_len(&self) -> usize {
        self.value_updater.replay_len()
    }

    pub fn counters(&self) -> EngineCounters {
        self.counters
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Snapshot of coefficients, scaler and counters
    pub fn state(&self) -> EngineState {
        EngineState {
            coefficients: self.coefficients,
            scaler: self.scaler.clone(),
            counters: self.counters,
        }
    }

    /// Restore coefficients, scaler and counters
    pub fn restore_state(&mut self, state: EngineState) -> Result<()> {
        if state.scaler.dim() != self.scaler.dim() {
            return Err(PpoError::shape(
                "scaler dimension",
                self.scaler.dim(),
                state.scaler.dim(),
            ));
        }
        self.coefficients = state.coefficients;
        self.scaler = state.scaler;
        self.counters = state.counters;
        Ok(())
    }
}
