//! Error types for tabflow

use thiserror::Error;

/// Result type alias for tabflow operations
pub type Result<T> = std::result::Result<T, TabflowError>;

/// Main error type for the pipeline library
#[derive(Error, Debug)]
pub enum TabflowError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Column not found: {0}")]
    FeatureNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Recipe error: {0}")]
    RecipeError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Metric error: {0}")]
    MetricError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl TabflowError {
    pub(crate) fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        TabflowError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for TabflowError {
    fn from(err: polars::error::PolarsError) -> Self {
        TabflowError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for TabflowError {
    fn from(err: serde_json::Error) -> Self {
        TabflowError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TabflowError {
    fn from(err: ndarray::ShapeError) -> Self {
        TabflowError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for TabflowError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        TabflowError::ThreadPoolError(err.to_string())
    }
}
