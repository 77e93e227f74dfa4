//! Error types for the investor index
//!
//! This module defines every error the index, the write-through protocol and
//! the collaborators can surface. Index-level lookups never produce errors;
//! they return `Option` and leave it to the caller to decide whether absence
//! is a failure.
//!
//! # Error Categories
//!
//! - **NotFound**: the record (or a nested contract/withdrawal) does not exist
//! - **Validation**: a mutation request is missing data or breaks a rule; rejected before the store is touched
//! - **Upstream**: the external store or the snapshot write failed; the index is left unchanged
//! - **MalformedSnapshot**: fatal at load time, the index is never partially built
//! - **File/I/O**: the snapshot path is missing or unreadable

use thiserror::Error;

/// Main error type for the investor index
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Record absent from the store or the index
    #[error("Record not found: {key}")]
    NotFound {
        /// The key (or nested entry descriptor) that was looked up
        key: String,
    },

    /// A mutation request was rejected before any write happened
    #[error("Validation failed: {message}")]
    Validation {
        /// Description of the rule that was broken
        message: String,
    },

    /// External store or snapshot write failed
    ///
    /// Retried with backoff when a retry policy is configured, otherwise
    /// the operation is aborted and step 6 of the protocol never runs.
    #[error("Upstream failure during {operation}: {message}")]
    Upstream {
        /// Operation that failed (e.g. "store write")
        operation: String,
        /// Description of the failure
        message: String,
    },

    /// The snapshot could not be decoded
    ///
    /// Fatal: the process must not start with a partially loaded index.
    #[error("Malformed snapshot: {message}")]
    MalformedSnapshot {
        /// Decoder message, including position when available
        message: String,
    },

    /// Snapshot file not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found
        path: String,
    },

    /// I/O error while reading or writing files
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
    },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::Io {
            message: error.to_string(),
        }
    }
}

impl LedgerError {
    /// Create a NotFound error
    pub fn not_found(key: impl Into<String>) -> Self {
        LedgerError::NotFound { key: key.into() }
    }

    /// Create a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
        }
    }

    /// Create an Upstream error
    pub fn upstream(operation: &str, message: impl Into<String>) -> Self {
        LedgerError::Upstream {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Create a MalformedSnapshot error
    pub fn malformed_snapshot(message: impl Into<String>) -> Self {
        LedgerError::MalformedSnapshot {
            message: message.into(),
        }
    }

    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Upstream { .. })
    }
}
