//! Core abstractions
//!
//! Transitions, actions, observation scaling and tensor conversion helpers.

pub mod scaler;
pub mod tensor;
pub mod transition;

pub use scaler::RunningScaler;
pub use transition::{Action, ActionSpace, SampleBatch, Transition};
