// Copyright 2025 Cowboy AI, LLC.

//! Error types for linking and composition operations

use thiserror::Error;

/// Errors that can occur while linking a question or composing triples
#[derive(Debug, Clone, Error)]
pub enum LinkingError {
    /// The external index or triple store could not answer a call
    #[error("Index unavailable during {operation}: {message}")]
    IndexUnavailable {
        /// Name of the collaborator call that failed
        operation: String,
        /// Error message from the collaborator
        message: String,
    },

    /// A triple template could not be parsed
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// Configuration values are out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for linking operations
pub type LinkingResult<T> = Result<T, LinkingError>;

impl From<serde_json::Error> for LinkingError {
    fn from(err: serde_json::Error) -> Self {
        LinkingError::Serialization(err.to_string())
    }
}

impl LinkingError {
    /// Create an index failure for the named operation
    pub fn index_unavailable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        LinkingError::IndexUnavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Check if the failing call can be retried on its own
    ///
    /// Only collaborator failures are transient; a bad template or
    /// configuration fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LinkingError::IndexUnavailable { .. })
    }
}
