//! Error types for the DCGAN image trainer

use thiserror::Error;

use crate::model::ModelRole;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent configuration, detected before training starts
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    /// The category filter left nothing to train on
    #[error("No training images for categories {categories:?}{}", describe_available(.available))]
    DataUnavailableError {
        categories: Vec<i64>,
        available: Vec<i64>,
    },

    /// A loss became NaN or infinite during an update
    #[error("Non-finite {model} loss at step {step}: {value}")]
    NumericalInstabilityError {
        step: usize,
        model: ModelRole,
        value: f64,
    },

    /// Sample grid could not be rendered or written
    #[error("Failed to render samples for step {step}: {reason}")]
    RenderFailure { step: usize, reason: String },

    /// Dataset files could not be read
    #[error("Dataset error: {0}")]
    DatasetError(String),

    /// Torch error
    #[error("Torch error: {0}")]
    TorchError(#[from] tch::TchError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV export error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// `available` is empty when the caller handed over an already filtered, empty tensor
fn describe_available(available: &[i64]) -> String {
    if available.is_empty() {
        " (the training image tensor is empty)".to_string()
    } else {
        format!(" (labels present: {:?})", available)
    }
}

impl Error {
    /// Check if training may continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::RenderFailure { .. })
    }

    /// Step at which the error occurred, if it is tied to one
    pub fn step(&self) -> Option<usize> {
        match self {
            Error::NumericalInstabilityError { step, .. } | Error::RenderFailure { step, .. } => {
                Some(*step)
            }
            _ => None,
        }
    }
}
