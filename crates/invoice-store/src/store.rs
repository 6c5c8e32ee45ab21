//! Local Document Store: durable mapping of name -> DocumentRecord.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

use crate::backend::{BackendError, StorageBackend};
use crate::error::{Result, StoreError};
use crate::naming::NameError;
use crate::record::{DocumentRecord, SCRATCH_NAME};

/// Durable mapping `name -> DocumentRecord` over a pluggable backend.
///
/// Writes are serialized per key; reads take no lock. `list_all` is the only
/// discovery mechanism - callers filter, sort and search client-side, which
/// is fine at the scale of a personal document store.
pub struct DocumentStore<B: StorageBackend> {
    backend: B,
    write_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<B: StorageBackend> DocumentStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            write_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Per-key write lock, created on first use.
    fn key_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .write_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        locks.entry(name.to_string()).or_default().clone()
    }

    /// Check whether a record exists. Only a backend I/O failure produces an
    /// error; a clean miss is `Ok(false)`.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        self.backend
            .exists(name)
            .await
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))
    }

    /// Fetch a record. Encrypted records come back un-decrypted; use
    /// [`get_with_password`](Self::get_with_password) to gate access.
    pub async fn get(&self, name: &str) -> Result<DocumentRecord> {
        let bytes = self.backend.read(name).await.map_err(|e| match e {
            BackendError::NotFound(_) => StoreError::NotFound(name.to_string()),
            BackendError::Io(msg) => StoreError::StorageUnavailable(msg),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::StorageUnavailable(format!("record \"{name}\" is corrupt: {e}"))
        })
    }

    /// Fetch a password-protected record.
    ///
    /// Unencrypted records pass through. A digest mismatch, or an encrypted
    /// record whose digest is missing (corrupt payload), fails with
    /// `WrongPassword`.
    pub async fn get_with_password(&self, name: &str, password: &str) -> Result<DocumentRecord> {
        let record = self.get(name).await?;
        if !record.is_encrypted {
            return Ok(record);
        }
        if record.verify_password(password) {
            Ok(record)
        } else {
            Err(StoreError::WrongPassword(name.to_string()))
        }
    }

    /// Upsert a record by name.
    ///
    /// The record is written verbatim - callers own the `modified` refresh
    /// (see [`DocumentRecord::touch`]), so a put/get pair round-trips every
    /// field unchanged.
    pub async fn put(&self, record: DocumentRecord) -> Result<()> {
        if record.name.trim().is_empty() {
            return Err(StoreError::ValidationRejected(NameError::Empty));
        }
        if record.name == SCRATCH_NAME && record.is_encrypted {
            return Err(StoreError::Unsupported(
                "the scratch slot cannot be password-protected".into(),
            ));
        }
        let lock = self.key_lock(&record.name);
        let _guard = lock.lock().await;
        self.write_record(&record).await?;
        tracing::debug!(name = %record.name, "stored document");
        Ok(())
    }

    /// Remove a record. Deleting a non-existent name is reported as
    /// `NotFound`, not silently ignored, so callers can distinguish.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let lock = self.key_lock(name);
        let _guard = lock.lock().await;
        self.backend.delete(name).await.map_err(|e| match e {
            BackendError::NotFound(_) => StoreError::NotFound(name.to_string()),
            BackendError::Io(msg) => StoreError::StorageUnavailable(msg),
        })?;
        tracing::info!(name = %name, "deleted document");
        Ok(())
    }

    /// Enumerate every record, keyed by name.
    ///
    /// Records that fail to parse are logged and skipped rather than failing
    /// the whole listing.
    pub async fn list_all(&self) -> Result<BTreeMap<String, DocumentRecord>> {
        let keys = self
            .backend
            .list_keys()
            .await
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;

        let mut records = BTreeMap::new();
        for key in keys {
            match self.get(&key).await {
                Ok(record) => {
                    records.insert(key, record);
                }
                Err(err) => {
                    tracing::warn!(name = %key, "skipping unreadable record: {err}");
                }
            }
        }
        Ok(records)
    }

    /// Rename a record, atomically from the caller's perspective.
    ///
    /// Write under the new name, verify the readback, then delete the old
    /// name. On any failure before the delete the old record remains
    /// authoritative - data is never lost.
    pub async fn rename(&self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }

        // Lock both keys in a stable order so concurrent renames can't
        // deadlock.
        let (first, second) = if old < new { (old, new) } else { (new, old) };
        let first_lock = self.key_lock(first);
        let _first_guard = first_lock.lock().await;
        let second_lock = self.key_lock(second);
        let _second_guard = second_lock.lock().await;

        if self
            .backend
            .exists(new)
            .await
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?
        {
            return Err(StoreError::Conflict(new.to_string()));
        }

        let mut renamed = self.get(old).await?;
        renamed.name = new.to_string();
        renamed.touch();

        self.write_record(&renamed).await?;

        // Verify the new record is fully readable before the old one goes.
        let readback = self.get(new).await?;
        if readback.content != renamed.content {
            let _ = self.backend.delete(new).await;
            return Err(StoreError::StorageUnavailable(format!(
                "readback mismatch while renaming \"{old}\""
            )));
        }

        self.backend.delete(old).await.map_err(|e| match e {
            BackendError::NotFound(_) => StoreError::NotFound(old.to_string()),
            BackendError::Io(msg) => StoreError::StorageUnavailable(msg),
        })?;

        tracing::info!(from = %old, to = %new, "renamed document");
        Ok(())
    }

    /// Write a scratch snapshot and the scratch reset as one logical unit.
    ///
    /// Both writes happen under the scratch key's lock, so no other write to
    /// the scratch slot can interleave between them. A failed snapshot write
    /// aborts before the reset is attempted.
    pub async fn snapshot_and_reset(
        &self,
        snapshot: DocumentRecord,
        reset: DocumentRecord,
    ) -> Result<()> {
        if reset.name != SCRATCH_NAME {
            return Err(StoreError::Unsupported(format!(
                "reset record must target \"{SCRATCH_NAME}\", not \"{}\"",
                reset.name
            )));
        }
        if snapshot.name == SCRATCH_NAME {
            return Err(StoreError::Unsupported(
                "snapshot record may not reuse the scratch name".into(),
            ));
        }

        let lock = self.key_lock(SCRATCH_NAME);
        let _guard = lock.lock().await;

        self.write_record(&snapshot).await?;
        self.write_record(&reset).await?;

        tracing::info!(snapshot = %snapshot.name, "snapshotted scratch slot");
        Ok(())
    }

    async fn write_record(&self, record: &DocumentRecord) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(record).map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to serialize record: {e}"))
        })?;
        self.backend
            .write(&record.name, &bytes)
            .await
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use std::sync::Arc;

    fn store() -> DocumentStore<Arc<MemoryBackend>> {
        DocumentStore::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn test_put_get_roundtrips_every_field() {
        let store = store();
        let record = DocumentRecord::from_raw("Invoice-1", "cell:A1:t:Total", 2);
        store.put(record.clone()).await.unwrap();

        let fetched = store.get("Invoice-1").await.unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = store();
        assert!(matches!(
            store.get("Invoice-1").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_then_get_fails() {
        let store = store();
        store
            .put(DocumentRecord::from_raw("Invoice-1", "x", 1))
            .await
            .unwrap();

        store.delete("Invoice-1").await.unwrap();
        assert!(matches!(
            store.get("Invoice-1").await,
            Err(StoreError::NotFound(_))
        ));
        // reported, not silently ignored
        assert!(matches!(
            store.delete("Invoice-1").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_is_upsert() {
        let store = store();
        store
            .put(DocumentRecord::from_raw("Invoice-1", "one", 1))
            .await
            .unwrap();
        store
            .put(DocumentRecord::from_raw("Invoice-1", "two", 2))
            .await
            .unwrap();

        let fetched = store.get("Invoice-1").await.unwrap();
        assert_eq!(fetched.decoded_content().unwrap(), "two");
        assert_eq!(fetched.bill_type, 2);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_encrypted_record_gates_reads() {
        let store = store();
        store
            .put(DocumentRecord::encrypted("Secret", "payload", 1, "hunter2"))
            .await
            .unwrap();

        // plain get returns the record un-decrypted
        let plain = store.get("Secret").await.unwrap();
        assert!(plain.is_encrypted);

        assert!(store.get_with_password("Secret", "hunter2").await.is_ok());
        assert!(matches!(
            store.get_with_password("Secret", "nope").await,
            Err(StoreError::WrongPassword(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_digest_is_wrong_password() {
        let store = store();
        let mut record = DocumentRecord::from_raw("Secret", "payload", 1);
        record.is_encrypted = true; // corrupt: encrypted but no digest
        store.put(record).await.unwrap();

        assert!(matches!(
            store.get_with_password("Secret", "anything").await,
            Err(StoreError::WrongPassword(_))
        ));
    }

    #[tokio::test]
    async fn test_scratch_slot_never_encrypted() {
        let store = store();
        let result = store
            .put(DocumentRecord::encrypted("default", "x", 1, "pw"))
            .await;
        assert!(matches!(result, Err(StoreError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_list_all_returns_every_record() {
        let store = store();
        for name in ["Invoice-1", "Invoice-2", "default"] {
            store
                .put(DocumentRecord::from_raw(name, "x", 1))
                .await
                .unwrap();
        }

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.contains_key("default"));
        assert!(all.contains_key("Invoice-2"));
    }

    #[tokio::test]
    async fn test_rename_preserves_created_and_removes_old() {
        let store = store();
        let original = DocumentRecord::from_raw("Old Name", "payload", 2);
        let created = original.created;
        store.put(original).await.unwrap();

        store.rename("Old Name", "New Name").await.unwrap();

        assert!(!store.exists("Old Name").await.unwrap());
        let renamed = store.get("New Name").await.unwrap();
        assert_eq!(renamed.created, created);
        assert_eq!(renamed.decoded_content().unwrap(), "payload");
        assert!(renamed.modified >= renamed.created);
    }

    #[tokio::test]
    async fn test_rename_conflict_leaves_both_intact() {
        let store = store();
        store
            .put(DocumentRecord::from_raw("A", "a-content", 1))
            .await
            .unwrap();
        store
            .put(DocumentRecord::from_raw("B", "b-content", 1))
            .await
            .unwrap();

        assert!(matches!(
            store.rename("A", "B").await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(
            store.get("A").await.unwrap().decoded_content().unwrap(),
            "a-content"
        );
        assert_eq!(
            store.get("B").await.unwrap().decoded_content().unwrap(),
            "b-content"
        );
    }

    #[tokio::test]
    async fn test_rename_failure_keeps_old_authoritative() {
        let backend = Arc::new(MemoryBackend::new());
        let store = DocumentStore::new(Arc::clone(&backend));
        store
            .put(DocumentRecord::from_raw("Old Name", "payload", 1))
            .await
            .unwrap();

        backend.set_fail_writes(true);
        assert!(store.rename("Old Name", "New Name").await.is_err());
        backend.set_fail_writes(false);

        assert!(store.exists("Old Name").await.unwrap());
        assert!(!store.exists("New Name").await.unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_and_reset_writes_both() {
        let store = store();
        store
            .put(DocumentRecord::from_raw("default", "user work", 3))
            .await
            .unwrap();

        let snapshot = DocumentRecord::from_raw("Untitled-20250706-103000", "user work", 3);
        let reset = DocumentRecord::from_raw("default", "template", 1);
        store.snapshot_and_reset(snapshot, reset).await.unwrap();

        assert_eq!(
            store
                .get("Untitled-20250706-103000")
                .await
                .unwrap()
                .decoded_content()
                .unwrap(),
            "user work"
        );
        let scratch = store.get("default").await.unwrap();
        assert_eq!(scratch.decoded_content().unwrap(), "template");
        assert_eq!(scratch.bill_type, 1);
    }

    #[tokio::test]
    async fn test_failed_snapshot_aborts_reset() {
        let backend = Arc::new(MemoryBackend::new());
        let store = DocumentStore::new(Arc::clone(&backend));
        store
            .put(DocumentRecord::from_raw("default", "user work", 3))
            .await
            .unwrap();

        backend.set_fail_writes(true);
        let snapshot = DocumentRecord::from_raw("Untitled-20250706-103000", "user work", 3);
        let reset = DocumentRecord::from_raw("default", "template", 1);
        assert!(store.snapshot_and_reset(snapshot, reset).await.is_err());
        backend.set_fail_writes(false);

        // the scratch slot still holds the user's work
        let scratch = store.get("default").await.unwrap();
        assert_eq!(scratch.decoded_content().unwrap(), "user work");
        assert!(!store.exists("Untitled-20250706-103000").await.unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_and_reset_rejects_misuse() {
        let store = store();
        let snap = DocumentRecord::from_raw("default", "x", 1);
        let reset = DocumentRecord::from_raw("default", "y", 1);
        assert!(matches!(
            store.snapshot_and_reset(snap, reset).await,
            Err(StoreError::Unsupported(_))
        ));

        let snap = DocumentRecord::from_raw("Untitled-1", "x", 1);
        let not_reset = DocumentRecord::from_raw("Other", "y", 1);
        assert!(matches!(
            store.snapshot_and_reset(snap, not_reset).await,
            Err(StoreError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_as_unavailable() {
        let backend = Arc::new(MemoryBackend::new());
        let store = DocumentStore::new(Arc::clone(&backend));

        backend.set_fail_writes(true);
        assert!(matches!(
            store.put(DocumentRecord::from_raw("Invoice-1", "x", 1)).await,
            Err(StoreError::StorageUnavailable(_))
        ));
    }
}
