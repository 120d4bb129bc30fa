//! Error types for SeqAlign

use thiserror::Error;

/// Result type alias for SeqAlign operations
pub type Result<T> = std::result::Result<T, SeqAlignError>;

/// Main error type shared across the workspace
#[derive(Error, Debug)]
pub enum SeqAlignError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported tool: {0}")]
    UnknownTool(String),

    #[error("Invalid job state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
