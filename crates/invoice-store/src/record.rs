//! The persisted unit: a named invoice document plus metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, StoreError};

/// Reserved name of the single scratch slot.
pub const SCRATCH_NAME: &str = "default";

/// Canonical bill type for a fresh scratch document (1 = Invoice).
pub const DEFAULT_BILL_TYPE: u32 = 1;

/// A named, persisted unit of invoice content plus metadata.
///
/// `content` is the serialized spreadsheet state, percent-encoded. The store
/// never interprets the payload beyond encoding/decoding at its boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Unique key within the store; also the display filename.
    pub name: String,
    /// Creation timestamp (ISO-8601 on the wire).
    pub created: DateTime<Utc>,
    /// Last-write timestamp; never earlier than `created`.
    pub modified: DateTime<Utc>,
    /// Percent-encoded spreadsheet state.
    pub content: String,
    /// Template/footer variant (1 = Invoice, 2 = Receipt, 3 = Estimate, ...).
    pub bill_type: u32,
    /// When true, plain reads return the record un-decrypted and
    /// [`get_with_password`](crate::store::DocumentStore::get_with_password)
    /// gates access.
    #[serde(default)]
    pub is_encrypted: bool,
    /// SHA-256 hex digest of the password; present iff `is_encrypted`.
    /// Opaque to the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl DocumentRecord {
    /// Create an unencrypted record from already percent-encoded content.
    pub fn new(name: impl Into<String>, encoded_content: String, bill_type: u32) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            created: now,
            modified: now,
            content: encoded_content,
            bill_type,
            is_encrypted: false,
            password: None,
        }
    }

    /// Create an unencrypted record from raw spreadsheet content,
    /// percent-encoding it for storage.
    pub fn from_raw(name: impl Into<String>, raw_content: &str, bill_type: u32) -> Self {
        Self::new(name, urlencoding::encode(raw_content).into_owned(), bill_type)
    }

    /// Create a password-protected record from raw spreadsheet content.
    pub fn encrypted(
        name: impl Into<String>,
        raw_content: &str,
        bill_type: u32,
        password: &str,
    ) -> Self {
        let mut record = Self::from_raw(name, raw_content, bill_type);
        record.is_encrypted = true;
        record.password = Some(password_digest(password));
        record
    }

    /// Decode the stored content back to raw spreadsheet state.
    pub fn decoded_content(&self) -> Result<String> {
        urlencoding::decode(&self.content)
            .map(|cow| cow.into_owned())
            .map_err(|err| {
                StoreError::StorageUnavailable(format!(
                    "content of \"{}\" is not valid percent-encoding: {err}",
                    self.name
                ))
            })
    }

    /// Refresh `modified` to now.
    pub fn touch(&mut self) {
        self.modified = Utc::now();
    }

    /// Check a candidate password against the stored digest.
    pub fn verify_password(&self, password: &str) -> bool {
        match &self.password {
            Some(digest) => *digest == password_digest(password),
            None => false,
        }
    }
}

/// SHA-256 hex digest of a password. The encryption scheme itself is an
/// external collaborator; the store only keeps the digest.
pub fn password_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Lightweight listing row derived from a record, for enumeration, search
/// and sort without shipping content to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMeta {
    pub name: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub bill_type: u32,
    pub is_encrypted: bool,
}

impl From<&DocumentRecord> for FileMeta {
    fn from(record: &DocumentRecord) -> Self {
        Self {
            name: record.name.clone(),
            created: record.created,
            modified: record.modified,
            bill_type: record.bill_type,
            is_encrypted: record.is_encrypted,
        }
    }
}

/// Sort criteria for file listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    /// Case-insensitive, ascending.
    Name,
    /// Most recently created first.
    Created,
    /// Most recently modified first.
    Modified,
}

/// Sort listing rows in place.
pub fn sort_metas(metas: &mut [FileMeta], by: SortBy) {
    match by {
        SortBy::Name => {
            metas.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        }
        SortBy::Created => metas.sort_by(|a, b| b.created.cmp(&a.created)),
        SortBy::Modified => metas.sort_by(|a, b| b.modified.cmp(&a.modified)),
    }
}

/// Case-insensitive substring search over file names.
pub fn search_metas(metas: &[FileMeta], query: &str) -> Vec<FileMeta> {
    let term = query.trim().to_lowercase();
    if term.is_empty() {
        return metas.to_vec();
    }
    metas
        .iter()
        .filter(|meta| meta.name.to_lowercase().contains(&term))
        .cloned()
        .collect()
}
