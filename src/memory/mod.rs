//! Experience Memory
//!
//! Trajectory buffers for storing episodes and flattening them for training.

pub mod trajectory;

pub use trajectory::{FlattenedBatch, Trajectory, TrajectoryBuffer};
