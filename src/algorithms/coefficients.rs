//! Adaptive Coefficients
//!
//! KL penalty weight, hinge weight and learning-rate multiplier, adjusted
//! once per policy update from the KL the update ended with.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PpoConfig;
use crate::error::{PpoError, Result};

const BETA_MAX: f32 = 35.0;
const BETA_MIN: f32 = 1.0 / 35.0;
const BETA_STEP: f32 = 1.5;
const LR_SHRINK_ABOVE_BETA: f32 = 30.0;
const LR_GROW_BELOW_BETA: f32 = 1.0 / 30.0;
const LR_MULTIPLIER_MIN: f32 = 0.1;
const LR_MULTIPLIER_MAX: f32 = 10.0;
const LR_STEP: f32 = 1.5;

/// Names accepted by [`AdaptiveCoefficients::get`] / [`AdaptiveCoefficients::set`]
pub const PARAMETER_NAMES: [&str; 4] = ["beta", "eta", "lr_multiplier", "kl_target"];

/// Mutable trust-region coefficients owned by one engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveCoefficients {
    pub beta: f32,
    pub eta: f32,
    pub lr_multiplier: f32,
    pub kl_target: f32,
}

impl AdaptiveCoefficients {
    pub fn from_config(config: &PpoConfig) -> Self {
        Self {
            beta: config.beta,
            eta: config.eta,
            lr_multiplier: config.lr_multiplier,
            kl_target: config.kl_target,
        }
    }

    /// Adjust beta and the learning-rate multiplier from the final KL
    pub fn adapt(&mut self, kl: f32) {
        let before = *self;

        if kl > 2.0 * self.kl_target {
            self.beta = (BETA_STEP * self.beta).min(BETA_MAX);
            if self.beta > LR_SHRINK_ABOVE_BETA && self.lr_multiplier > LR_MULTIPLIER_MIN {
                self.lr_multiplier /= LR_STEP;
            }
        } else if kl < self.kl_target / 2.0 {
            self.beta = (self.beta / BETA_STEP).max(BETA_MIN);
            if self.beta < LR_GROW_BELOW_BETA && self.lr_multiplier < LR_MULTIPLIER_MAX {
                self.lr_multiplier *= LR_STEP;
            }
        }

        if *self != before {
            debug!(
                kl,
                beta = self.beta,
                lr_multiplier = self.lr_multiplier,
                "Adapted trust-region coefficients"
            );
        }
    }

    /// Read a coefficient by name
    pub fn get(&self, name: &str) -> Result<f32> {
        match name {
            "beta" => Ok(self.beta),
            "eta" => Ok(self.eta),
            "lr_multiplier" => Ok(self.lr_multiplier),
            "kl_target" => Ok(self.kl_target),
            other => Err(PpoError::UnknownParameter(other.to_string())),
        }
    }

    /// Overwrite a coefficient by name
    pub fn set(&mut self, name: &str, value: f32) -> Result<()> {
        let slot = match name {
            "beta" => &mut self.beta,
            "eta" => &mut self.eta,
            "lr_multiplier" => &mut self.lr_multiplier,
            "kl_target" => &mut self.kl_target,
            other => return Err(PpoError::UnknownParameter(other.to_string())),
        };
        *slot = value;
        Ok(())
    }
}
