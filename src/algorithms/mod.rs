//! Trust-Region Algorithms
//!
//! Advantage estimation, policy and value update loops, and the engine that
//! ties them together.

pub mod advantage;
pub mod coefficients;
pub mod objective;
pub mod optimizer;
pub mod policy_update;
pub mod trust_region;
pub mod value_update;

pub use coefficients::AdaptiveCoefficients;
pub use objective::SurrogateObjective;
pub use optimizer::{adam, BurnOptimizer, GradientStep};
pub use policy_update::{PolicyUpdateStats, PolicyUpdater};
pub use trust_region::{EngineCounters, EngineState, TrainMetrics, TrustRegionOptimizer};
pub use value_update::{explained_variance, ValueUpdateStats, ValueUpdater};
