//! Filename legality, reserved names and collision checks.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::backend::StorageBackend;
use crate::error::{Result, StoreError};
use crate::store::DocumentStore;

/// Longest accepted filename, post-trim.
pub const MAX_NAME_LEN: usize = 30;

/// Names no user-created document may take.
pub const RESERVED_NAMES: &[&str] = &["default", "Untitled"];

/// Why a candidate filename was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("\"{0}\" is a reserved name")]
    Reserved(String),

    #[error("filename cannot be empty")]
    Empty,

    #[error("filename too long (max {MAX_NAME_LEN} characters)")]
    TooLong,

    #[error("special characters cannot be used")]
    IllegalCharacters,
}

/// Validate a candidate filename against the pure naming rules.
///
/// Returns the trimmed name on success. The store existence check lives in
/// [`validate_new_name`] since it needs a lookup.
pub fn validate_name(candidate: &str) -> std::result::Result<String, NameError> {
    let trimmed = candidate.trim();
    if RESERVED_NAMES.contains(&trimmed) {
        return Err(NameError::Reserved(trimmed.to_string()));
    }
    if trimmed.is_empty() {
        return Err(NameError::Empty);
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(NameError::TooLong);
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ' ')
    {
        return Err(NameError::IllegalCharacters);
    }
    Ok(trimmed.to_string())
}

/// Validate a candidate filename for a new or renamed document.
///
/// `exclude` names a record the candidate is allowed to collide with
/// (rename / update-in-place flows). Returns the trimmed name.
pub async fn validate_new_name<B: StorageBackend>(
    store: &DocumentStore<B>,
    candidate: &str,
    exclude: Option<&str>,
) -> Result<String> {
    let trimmed = validate_name(candidate)?;
    if store.exists(&trimmed).await? && exclude != Some(trimmed.as_str()) {
        return Err(StoreError::Conflict(trimmed));
    }
    Ok(trimmed)
}

/// Timestamp-derived snapshot name, within the legal filename charset.
pub fn untitled_name(now: DateTime<Utc>) -> String {
    format!("Untitled-{}", now.format("%Y%m%d-%H%M%S"))
}

/// First `Untitled-<timestamp>` name not already taken, probing numeric
/// suffixes on collision.
pub async fn available_untitled_name<B: StorageBackend>(
    store: &DocumentStore<B>,
    now: DateTime<Utc>,
) -> Result<String> {
    let base = untitled_name(now);
    if !store.exists(&base).await? {
        return Ok(base);
    }
    for n in 2.. {
        let candidate = format!("{base}-{n}");
        if !store.exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    unreachable!("suffix probing terminates on the first free name")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::record::DocumentRecord;
    use chrono::TimeZone;

    fn store() -> DocumentStore<MemoryBackend> {
        DocumentStore::new(MemoryBackend::new())
    }

    #[test]
    fn test_reserved_names_rejected() {
        assert_eq!(
            validate_name("default"),
            Err(NameError::Reserved("default".into()))
        );
        assert_eq!(
            validate_name("Untitled"),
            Err(NameError::Reserved("Untitled".into()))
        );
        // only exact matches are reserved
        assert!(validate_name("Untitled-2").is_ok());
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(validate_name(""), Err(NameError::Empty));
        assert_eq!(validate_name("   "), Err(NameError::Empty));
    }

    #[test]
    fn test_too_long_rejected() {
        assert_eq!(validate_name(&"a".repeat(31)), Err(NameError::TooLong));
        assert!(validate_name(&"a".repeat(30)).is_ok());
    }

    #[test]
    fn test_special_characters_rejected() {
        assert_eq!(validate_name("na/me"), Err(NameError::IllegalCharacters));
        assert_eq!(validate_name("na.me"), Err(NameError::IllegalCharacters));
        assert_eq!(validate_name("naïve"), Err(NameError::IllegalCharacters));
        assert!(validate_name("Invoice-1 final").is_ok());
    }

    #[test]
    fn test_name_is_trimmed() {
        assert_eq!(validate_name("  Invoice-1  ").unwrap(), "Invoice-1");
    }

    #[tokio::test]
    async fn test_existing_name_conflicts() {
        let store = store();
        store
            .put(DocumentRecord::from_raw("Invoice-1", "x", 1))
            .await
            .unwrap();

        assert!(matches!(
            validate_new_name(&store, "Invoice-1", None).await,
            Err(StoreError::Conflict(_))
        ));
        // the exclude name is allowed to collide (rename flows)
        assert_eq!(
            validate_new_name(&store, "Invoice-1", Some("Invoice-1"))
                .await
                .unwrap(),
            "Invoice-1"
        );
        assert_eq!(
            validate_new_name(&store, "Invoice-2", None).await.unwrap(),
            "Invoice-2"
        );
    }

    #[tokio::test]
    async fn test_untitled_name_collision_probing() {
        let store = store();
        let now = Utc.with_ymd_and_hms(2025, 7, 6, 10, 30, 0).unwrap();
        let base = untitled_name(now);
        assert_eq!(base, "Untitled-20250706-103000");

        assert_eq!(available_untitled_name(&store, now).await.unwrap(), base);

        store
            .put(DocumentRecord::from_raw(base.clone(), "x", 1))
            .await
            .unwrap();
        assert_eq!(
            available_untitled_name(&store, now).await.unwrap(),
            format!("{base}-2")
        );

        store
            .put(DocumentRecord::from_raw(format!("{base}-2"), "x", 1))
            .await
            .unwrap();
        assert_eq!(
            available_untitled_name(&store, now).await.unwrap(),
            format!("{base}-3")
        );
    }
}
