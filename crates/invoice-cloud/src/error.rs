//! Error types for the remote file service and reconciliation policy.

use invoice_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CloudError {
    /// The remote service could not be reached, or answered with a failure.
    #[error("remote service unavailable: {0}")]
    RemoteUnavailable(String),

    /// No valid bearer token; the stored token (if any) has been cleared.
    #[error("authentication required")]
    AuthRequired,

    /// The downloaded payload is not a well-formed invoice envelope.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Local store failure while reconciling.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CloudError {
    /// Stable short label for aggregate reports.
    pub fn kind(&self) -> &'static str {
        match self {
            CloudError::RemoteUnavailable(_) => "RemoteUnavailable",
            CloudError::AuthRequired => "AuthRequired",
            CloudError::InvalidEnvelope(_) => "InvalidEnvelope",
            CloudError::Store(err) => err.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
