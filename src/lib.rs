pub mod algorithms;
pub mod cli;
pub mod config;
pub mod core;
pub mod environment;
pub mod error;
pub mod memory;
pub mod networks;
pub mod training;

pub use algorithms::{AdaptiveCoefficients, SurrogateObjective, TrainMetrics, TrustRegionOptimizer};
pub use self::config::{EngineConfig, PpoConfig};
pub use self::core::{Action, ActionSpace, RunningScaler, SampleBatch, Transition};
pub use error::{PpoError, Result};
pub use memory::{Trajectory, TrajectoryBuffer};
pub use networks::{StochasticPolicy, ValueFunction};
