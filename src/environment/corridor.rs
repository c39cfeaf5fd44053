//! Corridor Environment
//!
//! Discrete walk along a one-dimensional corridor. The agent starts in a
//! random cell of the left half and has to reach the rightmost cell.
//! Actions: 0 = left, 1 = stay, 2 = right.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Environment, StepResult};
use crate::core::{Action, ActionSpace};
use crate::error::Result;

/// Corridor configuration
#[derive(Debug, Clone)]
pub struct CorridorConfig {
    /// Number of cells
    pub length: usize,
    /// Maximum steps per episode
    pub max_steps: usize,
    /// Reward for every step that does not reach the goal
    pub step_penalty: f32,
    /// Reward for reaching the goal
    pub goal_reward: f32,
}

impl Default for CorridorConfig {
    fn default() -> Self {
        Self {
            length: 10,
            max_steps: 200,
            step_penalty: -0.01,
            goal_reward: 1.0,
        }
    }
}

/// Discrete-action reference environment
pub struct Corridor {
    config: CorridorConfig,
    rng: StdRng,
    position: usize,
    step_count: usize,
}

impl Corridor {
    pub fn new(config: CorridorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            position: 0,
            step_count: 0,
        }
    }

    fn goal(&self) -> usize {
        self.config.length.saturating_sub(1)
    }

    fn observation(&self) -> Vec<f32> {
        let goal = self.goal().max(1) as f32;
        let remaining = self.config.max_steps.saturating_sub(self.step_count) as f32
            / self.config.max_steps.max(1) as f32;
        vec![self.position as f32 / goal, remaining]
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl Environment for Corridor {
    fn observation_dim(&self) -> usize {
        2
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::Discrete { n: 3 }
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn reset(&mut self) -> Vec<f32> {
        let half = (self.config.length / 2).max(1);
        self.position = self.rng.gen_range(0..half);
        self.step_count = 0;
        self.observation()
    }

    fn step(&mut self, action: &Action) -> Result<StepResult> {
        self.action_space().check(action)?;

        self.step_count += 1;
        match action {
            Action::Discrete(0) => self.position = self.position.saturating_sub(1),
            Action::Discrete(2) => self.position = (self.position + 1).min(self.goal()),
            _ => {}
        }

        let reached = self.position == self.goal();
        let truncated = !reached && self.step_count >= self.config.max_steps;
        let reward = if reached {
            self.config.goal_reward
        } else {
            self.config.step_penalty
        };

        Ok(StepResult {
            observation: self.observation(),
            reward,
            done: reached || truncated,
            truncated,
        })
    }
}
