use thiserror::Error;

/// Main error type for the training engine
#[derive(Error, Debug)]
pub enum PpoError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    // Data errors
    #[error("Not enough trajectory data: {trajectories} completed trajectories")]
    InsufficientData { trajectories: usize },

    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Distribution output {0} is not declared by the policy")]
    UndeclaredOutput(String),

    // Environment errors
    #[error("Environment error: {0}")]
    Environment(String),

    // Persistence errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl PpoError {
    /// Shorthand for a shape mismatch on a named quantity
    pub fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        PpoError::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}

/// Result type alias for PpoError
pub type Result<T> = std::result::Result<T, PpoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_message() {
        let err = PpoError::InsufficientData { trajectories: 0 };
        assert_eq!(
            err.to_string(),
            "Not enough trajectory data: 0 completed trajectories"
        );
    }

    #[test]
    fn test_shape_helper() {
        let err = PpoError::shape("observation", 4, 3);
        assert!(matches!(
            err,
            PpoError::ShapeMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));
        assert!(err.to_string().contains("observation"));
    }
}
