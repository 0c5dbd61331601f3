//! Error types for SurgSim Score

use thiserror::Error;

/// Errors raised at the fallible edges of the engine (parsing, loading, encoding).
///
/// Evaluation itself never fails; these only surface while reading inputs or
/// writing outputs.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to read configuration: {0}")]
    ConfigError(String),

    #[error("Invalid procedure: {0}")]
    InvalidProcedure(String),

    #[error("Invalid evaluator configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
