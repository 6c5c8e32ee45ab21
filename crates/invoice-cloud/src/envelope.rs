//! Wire format for invoice documents on the remote file service.
//!
//! Remote-stored invoice documents carry a `server_` name prefix and a JSON
//! envelope wrapping the raw (not percent-encoded) spreadsheet content. The
//! reconciliation policy encodes/decodes at this boundary; the local store
//! always holds percent-encoded content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CloudError;

/// Name prefix marking invoice documents among the account's remote files.
pub const SERVER_PREFIX: &str = "server_";

/// Remote wrapper name for a local document name.
pub fn server_name(local: &str) -> String {
    format!("{SERVER_PREFIX}{local}")
}

/// Candidate local name for a remote wrapper name.
///
/// Strips the `server_` prefix (and a trailing `.json` from listing
/// filenames). `None` when the name doesn't carry the prefix.
pub fn local_name(remote: &str) -> Option<&str> {
    let stripped = remote.strip_prefix(SERVER_PREFIX)?;
    Some(stripped.strip_suffix(".json").unwrap_or(stripped))
}

/// Whether a remote filename is an invoice document of ours.
pub fn is_invoice_file(filename: &str) -> bool {
    filename.starts_with(SERVER_PREFIX)
}

/// The JSON envelope uploaded for each document.
///
/// Wire format:
/// `{"fileName":"server_<name>","content":"...","billType":1,"timestamp":"..."}`
///
/// `fileName`, `content` and `billType` are required; an envelope missing
/// any of them fails to parse. `timestamp` is informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceEnvelope {
    pub file_name: String,
    /// Raw spreadsheet content, not percent-encoded.
    pub content: String,
    pub bill_type: u32,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl InvoiceEnvelope {
    /// Wrap raw content for upload under the given local name.
    pub fn new(local: &str, content: String, bill_type: u32) -> Self {
        Self {
            file_name: server_name(local),
            content,
            bill_type,
            timestamp: Some(Utc::now()),
        }
    }

    /// Serialize to the JSON document stored remotely.
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec_pretty(self).expect("InvoiceEnvelope serialization should not fail")
    }

    /// Parse a downloaded payload, failing with `InvalidEnvelope` on
    /// malformed JSON or missing required fields.
    pub fn from_json(data: &[u8]) -> Result<Self, CloudError> {
        serde_json::from_slice(data).map_err(|e| CloudError::InvalidEnvelope(e.to_string()))
    }

    /// Candidate local name from the envelope's wrapper name.
    pub fn local_name(&self) -> Option<&str> {
        local_name(&self.file_name)
    }
}
