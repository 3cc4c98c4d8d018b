//! Error types for the product recommender.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, dataset loading, embedding, and
//! the vector index lifecycle.

use thiserror::Error;

/// Unified error type for the product recommender.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Per-record ingestion failures and per-query failures are *not* raised
/// through this type; they are collected into reports and outcomes by the
/// engine. Only errors that stop a run travel up as `AppError`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Dataset could not be read
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Embedding model errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Recoverable vector index service errors (network, rejected payload)
    #[error("Index error: {0}")]
    Index(String),

    /// The index handle can no longer be used (index gone, access revoked)
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// The index service rejected the index specification
    #[error("Index creation failed: {0}")]
    IndexCreation(String),

    /// The index never reported ready within the configured bound
    #[error("Index '{name}' not ready after {waited_secs:.1}s")]
    IndexNotReady { name: String, waited_secs: f64 },

    /// The index stats never converged on the expected vector count
    #[error(
        "Index '{name}' did not settle: expected {expected} vectors, observed {observed} after {waited_secs:.1}s"
    )]
    ConsistencyTimeout {
        name: String,
        expected: u64,
        observed: u64,
        waited_secs: f64,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error means the index handle itself is unusable,
    /// so processing further records against it cannot succeed.
    pub fn is_fatal_for_batch(&self) -> bool {
        matches!(self, AppError::IndexUnavailable(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_fatal() {
        assert!(AppError::IndexUnavailable("gone".to_string()).is_fatal_for_batch());
        assert!(!AppError::Index("timeout".to_string()).is_fatal_for_batch());
        assert!(!AppError::Embedding("bad".to_string()).is_fatal_for_batch());
    }

    #[test]
    fn test_not_ready_message() {
        let err = AppError::IndexNotReady {
            name: "product-recommend".to_string(),
            waited_secs: 12.0,
        };
        assert_eq!(
            err.to_string(),
            "Index 'product-recommend' not ready after 12.0s"
        );
    }

    #[test]
    fn test_json_error_converts() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
