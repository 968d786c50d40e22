use thiserror::Error;

use crate::uncertainty::hesse::HesseFailure;
use crate::uncertainty::minos::MinosFailure;

/// Error types for the minuit-rs library.
#[derive(Error, Debug)]
pub enum MinuitError {
    /// The objective failed or returned a non-finite value.
    #[error("Function evaluation error: {0}")]
    EvaluationError(String),

    /// No admissible step was found along the search direction.
    #[error("Line search failed: no decrease found after {trials} trial points")]
    LineSearchFailed { trials: usize },

    /// The Hessian could not be turned into a covariance matrix.
    #[error("HESSE failed: {0}")]
    HesseFailed(#[from] HesseFailure),

    /// The MINOS crossing point was not found for one side of a parameter.
    #[error("MINOS failed for parameter '{name}': {reason}")]
    MinosFailed { name: String, reason: MinosFailure },

    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error for parameter-related problems.
    #[error("Parameter error: {0}")]
    ParameterError(String),

    /// Parameter not found.
    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    /// Error for boundary constraint violations.
    #[error("Bounds error: {0}")]
    BoundsError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid state in the algorithm or data structure.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Linear algebra error.
    #[error("Linear algebra error: {0}")]
    LinearAlgebraError(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic error for cases that don't fit the other categories.
    #[error("Error: {0}")]
    Other(String),
}

impl From<crate::parameters::parameter::ParameterError> for MinuitError {
    fn from(err: crate::parameters::parameter::ParameterError) -> Self {
        match err {
            crate::parameters::parameter::ParameterError::ParameterNotFound { name } => {
                MinuitError::ParameterNotFound(name)
            }
            other => MinuitError::ParameterError(format!("{}", other)),
        }
    }
}

impl From<crate::parameters::bounds::BoundsError> for MinuitError {
    fn from(err: crate::parameters::bounds::BoundsError) -> Self {
        MinuitError::BoundsError(format!("{}", err))
    }
}

impl From<crate::parameters::SerializationError> for MinuitError {
    fn from(err: crate::parameters::SerializationError) -> Self {
        match err {
            crate::parameters::SerializationError::IoError(e) => MinuitError::IoError(e),
            crate::parameters::SerializationError::JsonError(e) => MinuitError::JsonError(e),
        }
    }
}

/// Result type alias for minuit-rs operations.
pub type Result<T> = std::result::Result<T, MinuitError>;

impl From<String> for MinuitError {
    fn from(s: String) -> Self {
        MinuitError::Other(s)
    }
}

impl From<&str> for MinuitError {
    fn from(s: &str) -> Self {
        MinuitError::Other(s.to_string())
    }
}
