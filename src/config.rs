//! Engine Configuration
//!
//! Configuration structs for the trust-region engine, the networks it trains,
//! the training driver and logging.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// PPO algorithm configuration
    pub ppo: PpoConfig,
    /// Policy / value network configuration
    #[serde(default)]
    pub networks: NetworkConfig,
    /// Training driver configuration
    #[serde(default)]
    pub training: TrainingConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// PPO algorithm hyperparameters
///
/// Every field without a serde default is required when loading from a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PpoConfig {
    /// Discount factor (gamma)
    pub gamma: f32,
    /// GAE lambda
    pub lam: f32,
    /// Base learning rate of the policy optimizer
    pub policy_lr: f64,
    /// Learning rate of the value function optimizer
    pub value_func_lr: f64,
    /// Maximum policy epochs per training round
    pub policy_train_iter: usize,
    /// Value function epochs per training round
    pub value_func_train_iter: usize,
    /// Value function mini-batch size
    pub value_func_train_batch_size: usize,
    /// Clipping range `[lower, upper]`; selects the clipped surrogate when set,
    /// the adaptive KL penalty otherwise
    #[serde(default)]
    pub clipping_range: Option<[f32; 2]>,
    /// Initial KL penalty weight
    pub beta: f32,
    /// Squared hinge penalty weight
    pub eta: f32,
    /// Desired mean KL per update
    pub kl_target: f32,
    /// Initial learning-rate multiplier
    pub lr_multiplier: f32,
    /// L2 weight penalty added to the policy loss
    #[serde(default)]
    pub policy_l2_reg: f32,
    /// L2 weight penalty added to the value loss
    #[serde(default)]
    pub value_func_l2_reg: f32,
    /// Epsilon inside the observation scaler's square root
    #[serde(default = "default_scaler_epsilon")]
    pub scaler_epsilon: f64,
    /// Seed for mini-batch shuffling
    #[serde(default)]
    pub seed: u64,
}

fn default_scaler_epsilon() -> f64 {
    1e-8
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            gamma: 0.995,
            lam: 0.98,
            policy_lr: 3e-4,
            value_func_lr: 1e-3,
            policy_train_iter: 20,
            value_func_train_iter: 10,
            value_func_train_batch_size: 256,
            clipping_range: None,
            beta: 1.0,
            eta: 50.0,
            kl_target: 0.003,
            lr_multiplier: 1.0,
            policy_l2_reg: 0.0,
            value_func_l2_reg: 0.0,
            scaler_epsilon: default_scaler_epsilon(),
            seed: 0,
        }
    }
}

impl PpoConfig {
    /// Validate hyperparameter ranges
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            errors.push(format!("gamma must be in (0, 1), got {}", self.gamma));
        }
        if !(0.0..=1.0).contains(&self.lam) {
            errors.push(format!("lam must be in [0, 1], got {}", self.lam));
        }
        if self.policy_lr <= 0.0 {
            errors.push("policy_lr must be positive".to_string());
        }
        if self.value_func_lr <= 0.0 {
            errors.push("value_func_lr must be positive".to_string());
        }
        if self.policy_train_iter == 0 {
            errors.push("policy_train_iter must be at least 1".to_string());
        }
        if self.value_func_train_batch_size == 0 {
            errors.push("value_func_train_batch_size must be at least 1".to_string());
        }
        if self.kl_target <= 0.0 {
            errors.push("kl_target must be positive".to_string());
        }
        if self.beta <= 0.0 {
            errors.push("beta must be positive".to_string());
        }
        if self.eta < 0.0 {
            errors.push("eta must be non-negative".to_string());
        }
        if self.lr_multiplier <= 0.0 {
            errors.push("lr_multiplier must be positive".to_string());
        }
        if let Some([lower, upper]) = self.clipping_range {
            if !(0.0..1.0).contains(&lower) || upper < 0.0 {
                errors.push(format!(
                    "clipping_range must satisfy 0 <= lower < 1 and upper >= 0, got [{lower}, {upper}]"
                ));
            }
        }
        if self.scaler_epsilon <= 0.0 {
            errors.push("scaler_epsilon must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Network architecture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Hidden width of the policy encoder
    pub policy_hidden_dim: usize,
    /// Hidden width of the value function encoder
    pub value_hidden_dim: usize,
    /// Initial log-variance of Gaussian policies
    pub init_log_var: f32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            policy_hidden_dim: 64,
            value_hidden_dim: 64,
            init_log_var: -1.0,
        }
    }
}

/// Built-in environments available to the training driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EnvKind {
    /// Continuous point reaching a random target
    TargetReach,
    /// Discrete walk along a corridor towards its goal cell
    Corridor,
}

/// Training driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Environment to train on
    pub env: EnvKind,
    /// Number of training rounds
    pub rounds: usize,
    /// Episodes collected before each call to `train`
    pub episodes_per_round: usize,
    /// Forced episode cutoff
    pub max_episode_steps: usize,
    /// Environment / backend seed
    pub seed: u64,
    /// Checkpoint save frequency (rounds, 0 disables)
    pub checkpoint_frequency: usize,
    /// Path for saving checkpoints
    pub checkpoint_dir: String,
    /// Maximum checkpoints to keep
    pub max_checkpoints: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            env: EnvKind::TargetReach,
            rounds: 50,
            episodes_per_round: 20,
            max_episode_steps: 200,
            seed: 42,
            checkpoint_frequency: 10,
            checkpoint_dir: "./checkpoints".to_string(),
            max_checkpoints: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON formatted logs
    pub json: bool,
    /// Also write logs to this directory
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a file, with environment overrides.
    ///
    /// The `[ppo]` section must list every required hyperparameter.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()).required(true))
            // Override with environment variables (PPO_ENGINE__PPO__GAMMA, etc.)
            .add_source(
                Environment::with_prefix("PPO_ENGINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Built-in defaults with environment overrides
    pub fn load_defaults() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&EngineConfig::default())?)
            .add_source(
                Environment::with_prefix("PPO_ENGINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = match self.ppo.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => errors,
        };

        if self.networks.policy_hidden_dim == 0 || self.networks.value_hidden_dim == 0 {
            errors.push("hidden dimensions must be positive".to_string());
        }
        if self.training.episodes_per_round == 0 {
            errors.push("episodes_per_round must be at least 1".to_string());
        }
        if self.training.max_episode_steps == 0 {
            errors.push("max_episode_steps must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
