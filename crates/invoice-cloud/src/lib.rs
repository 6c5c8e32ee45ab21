//! invoice-cloud: Remote file service client and reconciliation policy for
//! the invoice document store.
//!
//! This crate provides:
//! - The `server_` naming transform and the JSON upload envelope
//! - An HTTP client for the remote file service (bearer-token auth)
//! - The push/pull reconciliation policy with aggregate reporting

pub mod client;
pub mod envelope;
pub mod error;
pub mod reconcile;

pub use client::{AuthResponse, CloudClient, CloudSession, RemoteFiles, ServerFile, UploadReceipt};
pub use envelope::{InvoiceEnvelope, SERVER_PREFIX, local_name, server_name};
pub use error::CloudError;
pub use reconcile::{BatchReport, LiveDocument, Reconciler};
