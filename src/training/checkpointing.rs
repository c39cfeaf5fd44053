//! Model Checkpointing
//!
//! Save and restore an engine: policy and value function weights as named
//! MessagePack records, coefficients, scaler and counters as a JSON sidecar.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::AutodiffModule;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::AutodiffBackend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::algorithms::{EngineState, TrustRegionOptimizer};
use crate::error::{PpoError, Result};
use crate::networks::{StochasticPolicy, ValueFunction};

const STATE_SUFFIX: &str = "_state.json";

/// Sidecar written next to the network records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub name: String,
    pub step: u64,
    pub saved_at: DateTime<Utc>,
    pub state: EngineState,
}

/// Where a checkpoint was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedCheckpoint {
    pub path: PathBuf,
    pub step: u64,
    pub name: String,
}

/// Checkpointer for saving and loading engines
pub struct Checkpointer {
    /// Directory for checkpoints
    checkpoint_dir: PathBuf,
    /// Maximum checkpoints to keep per name
    max_checkpoints: usize,
}

impl Checkpointer {
    /// Create a new checkpointer
    pub fn new<P: AsRef<Path>>(checkpoint_dir: P, max_checkpoints: usize) -> Self {
        let checkpoint_dir = checkpoint_dir.as_ref().to_path_buf();

        if !checkpoint_dir.exists() {
            if let Err(e) = fs::create_dir_all(&checkpoint_dir) {
                warn!("Failed to create checkpoint directory: {}", e);
            }
        }

        Self {
            checkpoint_dir,
            max_checkpoints,
        }
    }

    fn file(&self, name: &str, step: u64, suffix: &str) -> PathBuf {
        self.checkpoint_dir
            .join(format!("{}{}", step_name(name, step), suffix))
    }

    /// Save policy, value function and engine state under `name` at `step`
    pub fn save<B, P, V>(
        &self,
        engine: &TrustRegionOptimizer<B, P, V>,
        step: u64,
        name: &str,
    ) -> Result<SavedCheckpoint>
    where
        B: AutodiffBackend,
        P: StochasticPolicy<B> + AutodiffModule<B> + 'static,
        V: ValueFunction<B> + AutodiffModule<B> + 'static,
    {
        fs::create_dir_all(&self.checkpoint_dir)?;
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();

        engine
            .policy()
            .clone()
            .save_file(self.file(name, step, "_policy.mpk"), &recorder)
            .map_err(|e| PpoError::Checkpoint(format!("Failed to save policy: {}", e)))?;
        engine
            .value_function()
            .clone()
            .save_file(self.file(name, step, "_value.mpk"), &recorder)
            .map_err(|e| PpoError::Checkpoint(format!("Failed to save value function: {}", e)))?;

        let meta = CheckpointMeta {
            name: name.to_string(),
            step,
            saved_at: Utc::now(),
            state: engine.state(),
        };
        fs::write(
            self.file(name, step, STATE_SUFFIX),
            serde_json::to_string_pretty(&meta)?,
        )?;

        info!("Saved checkpoint {} at step {} to {:?}", name, step, self.checkpoint_dir);

        self.cleanup_old_checkpoints(name);

        Ok(SavedCheckpoint {
            path: self.checkpoint_dir.clone(),
            step,
            name: name.to_string(),
        })
    }

    /// Restore `engine` from the checkpoint `name` at `step`, or the latest
    /// step when `step` is `None`. Returns the restored step.
    pub fn load<B, P, V>(
        &self,
        engine: &mut TrustRegionOptimizer<B, P, V>,
        name: &str,
        step: Option<u64>,
    ) -> Result<u64>
    where
        B: AutodiffBackend,
        P: StochasticPolicy<B> + AutodiffModule<B> + 'static,
        V: ValueFunction<B> + AutodiffModule<B> + 'static,
    {
        let step = match step {
            Some(step) => step,
            None => self
                .latest_step(name)
                .ok_or_else(|| PpoError::Checkpoint(format!("No checkpoint named {}", name)))?,
        };

        let state_path = self.file(name, step, STATE_SUFFIX);
        if !state_path.exists() {
            return Err(PpoError::Checkpoint(format!(
                "Checkpoint not found: {:?}",
                state_path
            )));
        }
        let meta: CheckpointMeta = serde_json::from_str(&fs::read_to_string(&state_path)?)?;

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let device = engine.device().clone();
        let policy = engine
            .policy()
            .clone()
            .load_file(self.file(name, step, "_policy.mpk"), &recorder, &device)
            .map_err(|e| PpoError::Checkpoint(format!("Failed to load policy: {}", e)))?;
        let value_fn = engine
            .value_function()
            .clone()
            .load_file(self.file(name, step, "_value.mpk"), &recorder, &device)
            .map_err(|e| PpoError::Checkpoint(format!("Failed to load value function: {}", e)))?;

        engine.restore_state(meta.state)?;
        engine.set_policy(policy);
        engine.set_value_function(value_fn);

        info!("Loaded checkpoint {} at step {}", name, step);
        Ok(step)
    }

    /// Saved steps for `name`, ascending
    pub fn list_steps(&self, name: &str) -> Vec<u64> {
        let prefix = format!("{}_step", name);
        let mut steps = Vec::new();

        if let Ok(entries) = fs::read_dir(&self.checkpoint_dir) {
            for entry in entries.flatten() {
                if let Some(file) = entry.file_name().to_str() {
                    let step = file
                        .strip_prefix(&prefix)
                        .and_then(|rest| rest.strip_suffix(STATE_SUFFIX))
                        .and_then(|digits| digits.parse::<u64>().ok());
                    if let Some(step) = step {
                        steps.push(step);
                    }
                }
            }
        }

        steps.sort_unstable();
        steps
    }

    /// Get latest saved step for `name`
    pub fn latest_step(&self, name: &str) -> Option<u64> {
        self.list_steps(name).into_iter().last()
    }

    /// Check if a checkpoint exists
    pub fn exists(&self, name: &str, step: u64) -> bool {
        self.file(name, step, STATE_SUFFIX).exists()
    }

    /// Cleanup old checkpoints keeping only max_checkpoints
    fn cleanup_old_checkpoints(&self, name: &str) {
        let steps = self.list_steps(name);

        if steps.len() <= self.max_checkpoints {
            return;
        }

        let to_remove = steps.len() - self.max_checkpoints;
        for step in steps.into_iter().take(to_remove) {
            for suffix in ["_policy.mpk", "_value.mpk", STATE_SUFFIX] {
                let path = self.file(name, step, suffix);
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Failed to remove old checkpoint {:?}: {}", path, e);
                }
            }
            info!("Removed old checkpoint: {} step {}", name, step);
        }
    }
}

/// File stem of a checkpoint at a given step
pub fn step_name(name: &str, step: u64) -> String {
    format!("{}_step{:08}", name, step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    #[test]
    fn test_step_name() {
        assert_eq!(step_name("ppo", 100), "ppo_step00000100");
    }

    #[test]
    fn test_list_steps_parses_sidecars() {
        let dir = temp_dir().join(format!("ppo_engine_ckpt_list_{}", std::process::id()));
        let checkpointer = Checkpointer::new(&dir, 5);

        for step in [20u64, 3, 100] {
            fs::write(checkpointer.file("run", step, STATE_SUFFIX), "{}").unwrap();
        }
        fs::write(dir.join("other_step00000007_state.json"), "{}").unwrap();
        fs::write(dir.join("run_step00000009_policy.mpk"), "").unwrap();

        assert_eq!(checkpointer.list_steps("run"), vec![3, 20, 100]);
        assert_eq!(checkpointer.latest_step("run"), Some(100));
        assert!(checkpointer.exists("run", 20));
        assert!(!checkpointer.exists("run", 9));

        fs::remove_dir_all(&dir).unwrap();
    }
}
