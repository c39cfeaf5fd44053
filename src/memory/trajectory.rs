//! Trajectory Memory
//!
//! Episode-bounded trajectory storage for on-policy training, and the
//! flattened batch view the update loops consume.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::core::Transition;

/// One episode, in the order its steps happened
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    transitions: Vec<Transition>,
}

impl Trajectory {
    /// Create an empty trajectory
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next step
    pub fn push(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    /// Get trajectory length
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn transitions_mut(&mut self) -> &mut [Transition] {
        &mut self.transitions
    }

    /// Rewards in temporal order
    pub fn rewards(&self) -> Vec<f32> {
        self.transitions.iter().map(|t| t.reward).collect()
    }

    /// States in temporal order
    pub fn states(&self) -> Vec<Vec<f32>> {
        self.transitions.iter().map(|t| t.state.clone()).collect()
    }
}

impl From<Vec<Transition>> for Trajectory {
    fn from(transitions: Vec<Transition>) -> Self {
        Self { transitions }
    }
}

/// Completed trajectories plus the episode currently being recorded
#[derive(Debug, Default)]
pub struct TrajectoryBuffer {
    /// Finished episodes
    completed: Vec<Trajectory>,
    /// Episode being recorded
    in_progress: Trajectory,
}

impl TrajectoryBuffer {
    /// Create a new trajectory buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transition; a `done` transition closes the current episode.
    pub fn append(&mut self, transition: Transition) {
        let done = transition.done;
        self.in_progress.push(transition);
        if done {
            let finished = std::mem::take(&mut self.in_progress);
            self.completed.push(finished);
        }
    }

    /// Drop all completed trajectories. The episode in progress is kept.
    pub fn reset(&mut self) {
        self.completed.clear();
    }

    /// Number of completed trajectories
    pub fn len(&self) -> usize {
        self.completed.len()
    }

    /// Check if there are no completed trajectories
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    pub fn completed(&self) -> &[Trajectory] {
        &self.completed
    }

    /// Steps recorded for the unfinished episode
    pub fn in_progress_len(&self) -> usize {
        self.in_progress.len()
    }
}

/// All transitions of a training round with trajectory boundaries erased
#[derive(Debug, Clone, Default)]
pub struct FlattenedBatch {
    transitions: Vec<Transition>,
}

impl FlattenedBatch {
    /// Flatten trajectories, keeping their relative order
    pub fn from_trajectories(trajectories: &[Trajectory]) -> Self {
        let transitions = trajectories
            .iter()
            .flat_map(|t| t.transitions().iter().cloned())
            .collect();
        Self { transitions }
    }

    /// Get batch size
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Append every transition of `other`
    pub fn union(&mut self, other: &FlattenedBatch) {
        self.transitions.extend(other.transitions.iter().cloned());
    }

    pub fn states(&self) -> Vec<Vec<f32>> {
        self.transitions.iter().map(|t| t.state.clone()).collect()
    }

    pub fn actions(&self) -> Vec<Vec<f32>> {
        self.transitions.iter().map(|t| t.action.to_vec()).collect()
    }

    pub fn advantages(&self) -> Vec<f32> {
        self.transitions
            .iter()
            .map(|t| t.advantage.unwrap_or(0.0))
            .collect()
    }

    pub fn discounted_returns(&self) -> Vec<f32> {
        self.transitions
            .iter()
            .map(|t| t.discounted_return.unwrap_or(0.0))
            .collect()
    }

    /// Standardize advantages to zero mean and unit variance.
    ///
    /// The standard deviation is floored at `min_std`.
    pub fn normalize_advantages(&mut self, min_std: f32) {
        let n = self.transitions.len();
        if n == 0 {
            return;
        }

        let advantages = self.advantages();
        let mean: f32 = advantages.iter().sum::<f32>() / n as f32;
        let var: f32 = advantages.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / n as f32;
        let std = var.sqrt().max(min_std);

        for (transition, adv) in self.transitions.iter_mut().zip(advantages) {
            transition.advantage = Some((adv - mean) / std);
        }
    }

    /// Shuffled index mini-batches covering the whole batch once
    pub fn minibatch_indices<R: Rng>(&self, batch_size: usize, rng: &mut R) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..self.transitions.len()).collect();
        indices.shuffle(rng);

        indices
            .chunks(batch_size.max(1))
            .map(|chunk| chunk.to_vec())
            .collect()
    }
}
