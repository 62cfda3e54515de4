//! Error types for issuetree operations.

use crate::domain::IssueKey;
use std::io;
use thiserror::Error;

/// The error type for issuetree operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The referenced issue does not exist or is not visible to the client.
    #[error("Issue not found: {0}")]
    NotFound(IssueKey),

    /// The tracker could not be reached or rejected the request.
    ///
    /// Never retried inside this crate; the caller decides on backoff.
    #[error("Tracker request for {key} failed: {message}")]
    Upstream {
        /// Key (or query) the failed request was about.
        key: String,
        /// Transport or authentication failure description.
        message: String,
    },

    /// A raw record is missing a required field or carries a malformed value.
    #[error("Malformed record {key}: field '{field}' {reason}")]
    DataShape {
        /// Key of the offending record, or `<unknown>` if the key itself is missing.
        key: String,
        /// Dotted path of the field that failed validation.
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build an [`Error::DataShape`] for a field on a given record.
    pub(crate) fn data_shape(
        key: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::DataShape {
            key: key.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that only mean a reference could not be resolved.
    ///
    /// Traversal uses this to skip a dangling branch instead of aborting.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// A specialized Result type for issuetree operations.
pub type Result<T> = std::result::Result<T, Error>;
