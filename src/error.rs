//! Error types for Quill
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Quill
#[derive(Debug, Error)]
pub enum QuillError {
    /// A referenced document, file or attachment could not be resolved
    #[error("Context error: {0}")]
    Context(String),

    /// Unknown skin name or invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// Document storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Quill operations
pub type Result<T> = std::result::Result<T, QuillError>;
