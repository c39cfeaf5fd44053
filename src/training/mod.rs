//! Training Infrastructure
//!
//! Episode collection, the round-based training loop, evaluation and
//! checkpointing.

pub mod checkpointing;
pub mod trainer;

pub use checkpointing::{step_name, CheckpointMeta, Checkpointer, SavedCheckpoint};
pub use trainer::{
    collect_episode, evaluate, summarize_results, EpisodeResult, RoundReport, TrainingLoop,
    TrainingSummary,
};
