//! Transitions and Actions
//!
//! One environment step, the action representations the engine understands
//! and the raw sample batches handed to `append_to_memory`.

use serde::{Deserialize, Serialize};

use crate::error::{PpoError, Result};

/// An action taken in the environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Real-valued action vector
    Continuous(Vec<f32>),
    /// Index into a discrete action set
    Discrete(usize),
}

impl Action {
    /// Flat float representation used to build action tensors
    pub fn to_vec(&self) -> Vec<f32> {
        match self {
            Action::Continuous(values) => values.clone(),
            Action::Discrete(index) => vec![*index as f32],
        }
    }

    /// Width of the flat representation
    pub fn width(&self) -> usize {
        match self {
            Action::Continuous(values) => values.len(),
            Action::Discrete(_) => 1,
        }
    }
}

/// Shape of the action space a policy acts in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionSpace {
    /// `dim` independent real-valued components
    Continuous { dim: usize },
    /// One of `n` discrete choices
    Discrete { n: usize },
}

impl ActionSpace {
    /// Width of the flat action representation
    pub fn width(&self) -> usize {
        match self {
            ActionSpace::Continuous { dim } => *dim,
            ActionSpace::Discrete { .. } => 1,
        }
    }

    /// Decode one row of a sampled action tensor
    pub fn decode(&self, row: &[f32]) -> Result<Action> {
        if row.len() != self.width() {
            return Err(PpoError::shape("action", self.width(), row.len()));
        }
        match self {
            ActionSpace::Continuous { .. } => Ok(Action::Continuous(row.to_vec())),
            ActionSpace::Discrete { n } => {
                let index = row[0].round().max(0.0) as usize;
                if index >= *n {
                    return Err(PpoError::Environment(format!(
                        "discrete action {index} out of range 0..{n}"
                    )));
                }
                Ok(Action::Discrete(index))
            }
        }
    }

    /// Check that an action belongs to this space
    pub fn check(&self, action: &Action) -> Result<()> {
        match (self, action) {
            (ActionSpace::Continuous { dim }, Action::Continuous(values)) => {
                if values.len() != *dim {
                    return Err(PpoError::shape("action", *dim, values.len()));
                }
                Ok(())
            }
            (ActionSpace::Discrete { n }, Action::Discrete(index)) => {
                if index >= n {
                    return Err(PpoError::Environment(format!(
                        "discrete action {index} out of range 0..{n}"
                    )));
                }
                Ok(())
            }
            _ => Err(PpoError::Environment(format!(
                "action {action:?} does not belong to {self:?}"
            ))),
        }
    }
}

/// A single transition in the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    /// State features before action
    pub state: Vec<f32>,
    /// Next state features
    pub new_state: Vec<f32>,
    /// Action taken
    pub action: Action,
    /// Reward received
    pub reward: f32,
    /// Whether the episode ended with this step
    pub done: bool,
    /// Value estimate at `state`
    pub estimated_value: Option<f32>,
    /// Discounted return from this step to the end of the episode
    pub discounted_return: Option<f32>,
    /// Advantage estimate
    pub advantage: Option<f32>,
}

impl Transition {
    /// Create a new transition
    pub fn new(state: Vec<f32>, action: Action, reward: f32, new_state: Vec<f32>, done: bool) -> Self {
        Self {
            state,
            new_state,
            action,
            reward,
            done,
            estimated_value: None,
            discounted_return: None,
            advantage: None,
        }
    }
}

/// Raw, time-ordered samples collected from an environment
#[derive(Debug, Clone, Default)]
pub struct SampleBatch {
    samples: Vec<Transition>,
}

impl SampleBatch {
    /// Create a new empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one raw step
    pub fn append(&mut self, state: Vec<f32>, action: Action, reward: f32, new_state: Vec<f32>, done: bool) {
        self.samples
            .push(Transition::new(state, action, reward, new_state, done));
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get batch size
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Samples in collection order
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.samples.iter()
    }
}

impl From<Vec<Transition>> for SampleBatch {
    fn from(samples: Vec<Transition>) -> Self {
        Self { samples }
    }
}
