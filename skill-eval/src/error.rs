//! Error types for the evaluation harness.
//!
//! Quality outcomes (syntax failures, pattern violations, missing recommendations)
//! are never errors: they are findings inside an `EvaluationResult`. The variants
//! below cover configuration, I/O and collaborator failures only.

use crate::config::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors that can occur while loading criteria or running scenarios
#[derive(Error, Debug)]
pub enum EvalError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration validation error with detailed context
    #[error("Configuration validation error: {0}")]
    ConfigValidation(#[from] ValidationError),

    /// No acceptance criteria file exists for the skill
    #[error("Acceptance criteria not found for '{skill}': {}", path.display())]
    CriteriaNotFound { skill: String, path: PathBuf },

    /// Acceptance criteria could not be interpreted
    #[error("Criteria error: {0}")]
    Criteria(String),

    /// Scenario file missing or malformed
    #[error("Scenario error: {0}")]
    Scenario(String),

    /// The code-generation collaborator failed
    #[error("Generation failed ({generator}): {message}")]
    Generation { generator: String, message: String },

    /// The code-generation collaborator did not answer in time
    #[error("Generation timed out ({generator}) after {seconds}s")]
    Timeout { generator: String, seconds: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EvalError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        EvalError::Configuration(msg.into())
    }

    /// Create a scenario error.
    pub fn scenario(msg: impl Into<String>) -> Self {
        EvalError::Scenario(msg.into())
    }

    /// Create a generation (collaborator) error.
    pub fn generation(generator: impl Into<String>, msg: impl Into<String>) -> Self {
        EvalError::Generation { generator: generator.into(), message: msg.into() }
    }

    /// Whether this error came from the code-generation collaborator.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self, EvalError::Generation { .. } | EvalError::Timeout { .. })
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for EvalError {
    fn from(err: serde_yaml::Error) -> Self {
        EvalError::Serialization(err.to_string())
    }
}
