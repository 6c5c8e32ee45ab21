//! Reconciliation policy: move documents between the local store and the
//! remote file service, keeping names consistent across the `server_`
//! boundary.
//!
//! Bulk operations run sequentially to bound remote load and keep the
//! aggregate report deterministic and attributable. Per-item failures are
//! recorded and skipped; one bad file never aborts the batch.

use std::time::Duration;

use invoice_store::backend::StorageBackend;
use invoice_store::record::{DocumentRecord, SCRATCH_NAME};
use invoice_store::store::DocumentStore;
use invoice_store::{StoreError, naming};

use crate::client::{RemoteFiles, ServerFile, UploadReceipt};
use crate::envelope::{self, InvoiceEnvelope};
use crate::error::{CloudError, Result};

/// Outcome of a bulk push or pull.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Names handled successfully, in processing order.
    pub succeeded: Vec<String>,
    /// `(name, error kind)` for every skipped item, in processing order.
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Live content of the currently open document, preferred over its stored
/// snapshot when pushing (the stored copy may lag behind the editor).
#[derive(Debug, Clone, Copy)]
pub struct LiveDocument<'a> {
    pub name: &'a str,
    pub content: &'a str,
}

/// Push/pull policy over any [`RemoteFiles`] implementation.
pub struct Reconciler<R: RemoteFiles> {
    remote: R,
    /// Pause between bulk items; politeness, not correctness.
    pace: Duration,
}

impl<R: RemoteFiles> Reconciler<R> {
    pub fn new(remote: R) -> Self {
        Self {
            remote,
            pace: Duration::from_millis(200),
        }
    }

    /// Override the inter-request pause (tests use `Duration::ZERO`).
    pub fn with_pace(remote: R, pace: Duration) -> Self {
        Self { remote, pace }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Upload one local document under its `server_` wrapper name.
    ///
    /// Encrypted documents are refused with `Unsupported`, never silently
    /// dropped. When `live` names this document, its content wins over the
    /// stored snapshot.
    pub async fn push_one<B: StorageBackend>(
        &self,
        store: &DocumentStore<B>,
        name: &str,
        live: Option<LiveDocument<'_>>,
    ) -> Result<UploadReceipt> {
        let record = store.get(name).await?;
        if record.is_encrypted {
            return Err(StoreError::Unsupported(format!(
                "\"{name}\" is password-protected and cannot be uploaded"
            ))
            .into());
        }

        let content = match live {
            Some(doc) if doc.name == name => doc.content.to_string(),
            _ => record.decoded_content()?,
        };

        let wrapper = envelope::server_name(name);
        let payload = InvoiceEnvelope::new(name, content, record.bill_type).to_json();
        let receipt = self
            .remote
            .upload(&format!("{wrapper}.json"), payload)
            .await?;
        tracing::debug!(name = %name, remote = %receipt.filename, "pushed document");
        Ok(receipt)
    }

    /// Upload every local document except the scratch slot.
    pub async fn push_all<B: StorageBackend>(
        &self,
        store: &DocumentStore<B>,
        live: Option<LiveDocument<'_>>,
    ) -> Result<BatchReport> {
        let names: Vec<String> = store
            .list_all()
            .await?
            .into_keys()
            .filter(|name| name != SCRATCH_NAME)
            .collect();

        let mut report = BatchReport::default();
        for (i, name) in names.iter().enumerate() {
            match self.push_one(store, name, live).await {
                Ok(_) => report.succeeded.push(name.clone()),
                Err(err) => {
                    tracing::warn!(name = %name, "push skipped: {err}");
                    report.failed.push((name.clone(), err.kind().to_string()));
                }
            }
            if i + 1 < names.len() && !self.pace.is_zero() {
                tokio::time::sleep(self.pace).await;
            }
        }

        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "push batch finished"
        );
        Ok(report)
    }

    /// Download one remote invoice file into the local store.
    ///
    /// The local record is only written after a fully successful
    /// download + parse; a name collision fails with `Conflict` and leaves
    /// the existing record untouched.
    pub async fn pull_one<B: StorageBackend>(
        &self,
        store: &DocumentStore<B>,
        file: &ServerFile,
    ) -> Result<String> {
        let bytes = self.remote.download(file.id).await?;
        let parsed = InvoiceEnvelope::from_json(&bytes)?;

        let Some(candidate) = parsed.local_name() else {
            return Err(CloudError::InvalidEnvelope(format!(
                "\"{}\" does not carry the {} prefix",
                parsed.file_name,
                envelope::SERVER_PREFIX
            )));
        };
        let local = naming::validate_name(candidate).map_err(StoreError::from)?;

        if store.exists(&local).await? {
            return Err(StoreError::Conflict(local).into());
        }

        store
            .put(DocumentRecord::from_raw(
                local.clone(),
                &parsed.content,
                parsed.bill_type,
            ))
            .await?;
        tracing::debug!(remote = %file.filename, local = %local, "pulled document");
        Ok(local)
    }

    /// Download every remote file carrying the `server_` prefix.
    pub async fn pull_all<B: StorageBackend>(&self, store: &DocumentStore<B>) -> Result<BatchReport> {
        let files: Vec<ServerFile> = self
            .remote
            .list_files()
            .await?
            .into_iter()
            .filter(|file| envelope::is_invoice_file(&file.filename))
            .collect();

        let mut report = BatchReport::default();
        for (i, file) in files.iter().enumerate() {
            match self.pull_one(store, file).await {
                Ok(local) => report.succeeded.push(local),
                Err(err) => {
                    tracing::warn!(remote = %file.filename, "pull skipped: {err}");
                    report
                        .failed
                        .push((file.filename.clone(), err.kind().to_string()));
                }
            }
            if i + 1 < files.len() && !self.pace.is_zero() {
                tokio::time::sleep(self.pace).await;
            }
        }

        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "pull batch finished"
        );
        Ok(report)
    }
}
