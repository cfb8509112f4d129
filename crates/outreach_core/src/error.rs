//! Error types for the core module.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while driving an outreach workflow.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Invalid workflow state: {0}")]
    InvalidState(String),

    #[error("Iteration limit exceeded: {steps} steps taken, limit is {limit}")]
    IterationLimitExceeded { limit: usize, steps: usize },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Escalation error: {0}")]
    Escalation(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
