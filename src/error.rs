//! Error types for cold storage
//!
//! Store operations are total and never fail; these errors describe what can
//! go wrong around them: computing a missing value and loading configuration.

use thiserror::Error;

// == Cold Storage Error Enum ==
/// Unified error type for the crate.
///
/// Cloneable so that a single failed computation can be delivered to every
/// caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColdStorageError {
    /// The wrapped operation returned an error
    #[error("Operation '{operation}' failed: {message}")]
    OperationFailed { operation: String, message: String },

    /// The wrapped operation panicked while computing
    #[error("Operation '{operation}' panicked: {message}")]
    OperationPanicked { operation: String, message: String },

    /// The computation this caller was waiting on was cancelled
    #[error("Operation '{operation}' was abandoned before completing")]
    Abandoned { operation: String },

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ColdStorageError {
    /// Builds an `OperationFailed` from any displayable error.
    pub fn failed(operation: &str, error: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }

    /// Maps a task that did not finish into the matching error.
    pub fn from_join_error(operation: &str, error: tokio::task::JoinError) -> Self {
        if !error.is_panic() {
            return Self::Abandoned {
                operation: operation.to_string(),
            };
        }

        let payload = error.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());

        Self::OperationPanicked {
            operation: operation.to_string(),
            message,
        }
    }

    /// The operation label this error refers to, if any.
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::OperationFailed { operation, .. }
            | Self::OperationPanicked { operation, .. }
            | Self::Abandoned { operation } => Some(operation),
            Self::InvalidConfig(_) => None,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, ColdStorageError>;
