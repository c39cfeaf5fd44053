//! Reference Environments
//!
//! Gym-like interface (reset / step / seed) the training driver collects
//! episodes from, plus two small seeded environments. Observations are raw;
//! normalization happens inside the engine.

mod corridor;
mod target_reach;

pub use corridor::{Corridor, CorridorConfig};
pub use target_reach::{TargetReach, TargetReachConfig};

use crate::config::EnvKind;
use crate::core::{Action, ActionSpace};
use crate::error::Result;

/// Result of taking a step in the environment
#[derive(Debug, Clone)]
pub struct StepResult {
    /// New observation after action
    pub observation: Vec<f32>,
    /// Reward signal
    pub reward: f32,
    /// Whether episode is done (terminal state or cutoff)
    pub done: bool,
    /// Whether the episode was cut off at the step limit
    pub truncated: bool,
}

/// Episodic environment
pub trait Environment {
    fn observation_dim(&self) -> usize;

    fn action_space(&self) -> ActionSpace;

    /// Reseed the environment's random source
    fn seed(&mut self, seed: u64);

    /// Start a new episode and return its first observation
    fn reset(&mut self) -> Vec<f32>;

    /// Apply an action
    fn step(&mut self, action: &Action) -> Result<StepResult>;
}

/// Build one of the built-in environments
pub fn make_env(kind: EnvKind, max_steps: usize, seed: u64) -> Box<dyn Environment> {
    match kind {
        EnvKind::TargetReach => Box::new(TargetReach::new(
            TargetReachConfig {
                max_steps,
                ..TargetReachConfig::default()
            },
            seed,
        )),
        EnvKind::Corridor => Box::new(Corridor::new(
            CorridorConfig {
                max_steps,
                ..CorridorConfig::default()
            },
            seed,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_env_spaces() {
        let reach = make_env(EnvKind::TargetReach, 10, 0);
        assert_eq!(reach.action_space(), ActionSpace::Continuous { dim: 2 });
        assert_eq!(reach.observation_dim(), 4);

        let corridor = make_env(EnvKind::Corridor, 10, 0);
        assert_eq!(corridor.action_space(), ActionSpace::Discrete { n: 3 });
    }

    #[test]
    fn test_forced_cutoff() {
        for kind in [EnvKind::TargetReach, EnvKind::Corridor] {
            let mut env = make_env(kind, 3, 1);
            env.reset();
            let action = match env.action_space() {
                ActionSpace::Continuous { dim } => Action::Continuous(vec![0.0; dim]),
                ActionSpace::Discrete { .. } => Action::Discrete(1),
            };

            let mut steps = 0;
            loop {
                let result = env.step(&action).unwrap();
                steps += 1;
                if result.done {
                    assert!(result.truncated);
                    break;
                }
            }
            assert_eq!(steps, 3);
        }
    }
}
