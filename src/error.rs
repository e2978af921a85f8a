//! Error types for Snoozeless

use thiserror::Error;

/// Errors that can occur while preparing data or fitting models
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse timestamp: {0}")]
    ParseError(String),

    #[error("Insufficient data to fit model: {0}")]
    InsufficientData(String),

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Encoding mismatch: {0}")]
    EncodingMismatch(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
