//! Error types for surface calibration and pricing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurfaceError {
    /// Calibration was asked to fit an empty point set.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Every calibration attempt ended with a non-finite cost.
    #[error("Calibration failed: all {attempts} attempts produced a non-finite cost")]
    CalibrationFailed { attempts: usize },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Plot error: {0}")]
    Plot(String),
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;

impl SurfaceError {
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    pub fn invalid_parameters(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
