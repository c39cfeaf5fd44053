//! Neural Network Architectures
//!
//! Policy and value function approximators built on burn, plus the action
//! distributions the policies produce.

pub mod distribution;
pub mod encoder;
pub mod policy;
pub mod value;

pub use distribution::{ActionDistribution, Categorical, DiagGaussian};
pub use encoder::{MlpEncoder, MlpEncoderConfig};
pub use policy::{
    CategoricalMlpPolicy, CategoricalMlpPolicyConfig, DistInfo, GaussianMlpPolicy,
    GaussianMlpPolicyConfig, ParamSharing, StochasticPolicy,
};
pub use value::{MlpValueFunction, MlpValueFunctionConfig, ValueFunction};
