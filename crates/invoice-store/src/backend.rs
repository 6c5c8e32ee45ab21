//! Storage backend abstraction for the document store.
//!
//! Implementations:
//! - `MemoryBackend` - For testing
//! - `DirBackend` - One JSON file per record under a data directory

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Durable key-value medium underneath the document store.
///
/// Keys are record names, verbatim and case-sensitive. The backend stores
/// opaque bytes; serialization is the store's concern.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the bytes stored under a key.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Write bytes under a key (create or overwrite). Must not leave a
    /// partially-written value observable by a subsequent read.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Remove a key. `NotFound` if absent.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check whether a key exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// List every key in the medium.
    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// In-memory backend for testing.
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make subsequent writes fail, for exercising `StorageUnavailable` paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let entries = self.entries.read().unwrap();
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(key.to_string()))
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(BackendError::Io("simulated write failure".into()));
        }
        let mut entries = self.entries.write().unwrap();
        entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let entries = self.entries.read().unwrap();
        Ok(entries.contains_key(key))
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().unwrap();
        Ok(entries.keys().cloned().collect())
    }
}

/// Filesystem backend: one JSON file per record under a data directory.
///
/// Record names become file names via percent-encoding, so names with spaces
/// stay legal on every platform.
pub struct DirBackend {
    dir: PathBuf,
}

impl DirBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(key)))
    }

    /// Atomic write using temp file + rename, so a crash mid-write never
    /// leaves a truncated record behind.
    async fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let temp_path = path.with_extension("json.tmp");

        if let Err(e) = fs::write(&temp_path, bytes).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for DirBackend {
    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        fs::read(self.key_path(key)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BackendError::NotFound(key.to_string())
            } else {
                BackendError::Io(e.to_string())
            }
        })
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BackendError::Io(e.to_string()))?;
        Self::atomic_write(&self.key_path(key), bytes)
            .await
            .map_err(|e| BackendError::Io(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        fs::remove_file(self.key_path(key)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BackendError::NotFound(key.to_string())
            } else {
                BackendError::Io(e.to_string())
            }
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        fs::try_exists(self.key_path(key))
            .await
            .map_err(|e| BackendError::Io(e.to_string()))
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            // A data directory that was never written to holds no keys.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(BackendError::Io(e.to_string())),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BackendError::Io(e.to_string()))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(encoded) = name.strip_suffix(".json") else {
                continue;
            };
            if let Ok(key) = urlencoding::decode(encoded) {
                keys.push(key.into_owned());
            }
        }

        Ok(keys)
    }
}

// Implement StorageBackend for Arc<T> where T: StorageBackend.
// This allows sharing a backend between the store and tests.
#[async_trait]
impl<T: StorageBackend> StorageBackend for std::sync::Arc<T> {
    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        (**self).write(key, bytes).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key).await
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        (**self).list_keys().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_backend_basic_operations() {
        let backend = MemoryBackend::new();

        backend.write("Invoice-1", b"hello").await.unwrap();
        assert_eq!(backend.read("Invoice-1").await.unwrap(), b"hello");
        assert!(backend.exists("Invoice-1").await.unwrap());
        assert!(!backend.exists("Invoice-2").await.unwrap());

        backend.delete("Invoice-1").await.unwrap();
        assert!(!backend.exists("Invoice-1").await.unwrap());
        assert!(matches!(
            backend.delete("Invoice-1").await,
            Err(BackendError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dir_backend_roundtrip() {
        let dir = TempDir::new().unwrap();
        let backend = DirBackend::new(dir.path());

        backend.write("March Invoice", b"payload").await.unwrap();
        assert_eq!(backend.read("March Invoice").await.unwrap(), b"payload");

        let keys = backend.list_keys().await.unwrap();
        assert_eq!(keys, vec!["March Invoice".to_string()]);

        backend.delete("March Invoice").await.unwrap();
        assert!(matches!(
            backend.read("March Invoice").await,
            Err(BackendError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dir_backend_empty_dir_lists_nothing() {
        let dir = TempDir::new().unwrap();
        let backend = DirBackend::new(dir.path().join("never-created"));
        assert!(backend.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dir_backend_overwrite() {
        let dir = TempDir::new().unwrap();
        let backend = DirBackend::new(dir.path());

        backend.write("Invoice-1", b"one").await.unwrap();
        backend.write("Invoice-1", b"two").await.unwrap();
        assert_eq!(backend.read("Invoice-1").await.unwrap(), b"two");
        assert_eq!(backend.list_keys().await.unwrap().len(), 1);
    }
}
