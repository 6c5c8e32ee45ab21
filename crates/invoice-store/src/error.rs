//! Error types for the local document store.

use crate::naming::NameError;
use thiserror::Error;

/// Errors surfaced by the document store and its policies.
///
/// The kinds are deliberately distinct because UI behavior differs per kind
/// (prompt for a password vs. show a validation message vs. a generic
/// failure notice).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document exists under the requested name.
    #[error("no document named \"{0}\"")]
    NotFound(String),

    /// The password did not match, or the encrypted payload is corrupt.
    #[error("wrong password for \"{0}\"")]
    WrongPassword(String),

    /// The underlying storage medium failed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A candidate filename was rejected by the naming rules.
    #[error("invalid filename: {0}")]
    ValidationRejected(#[from] NameError),

    /// A document with the target name already exists.
    #[error("a document named \"{0}\" already exists")]
    Conflict(String),

    /// The operation does not apply to this document.
    #[error("{0}")]
    Unsupported(String),
}

impl StoreError {
    /// Stable short label for aggregate reports.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "NotFound",
            StoreError::WrongPassword(_) => "WrongPassword",
            StoreError::StorageUnavailable(_) => "StorageUnavailable",
            StoreError::ValidationRejected(_) => "ValidationRejected",
            StoreError::Conflict(_) => "Conflict",
            StoreError::Unsupported(_) => "Unsupported",
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
