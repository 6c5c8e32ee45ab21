//! Lifecycle policy for the reserved scratch slot.
//!
//! The `default` record is the single working document. Before its slot is
//! reused (opening another file, creating a new one), live content that
//! differs from the seed template must be snapshotted under a fresh
//! `Untitled-<timestamp>` name so scratch work is never silently lost.

use chrono::Utc;
use serde_json::Value;

use crate::backend::StorageBackend;
use crate::error::Result;
use crate::naming;
use crate::record::{DEFAULT_BILL_TYPE, DocumentRecord};
use crate::store::DocumentStore;
use crate::template::{self, DeviceClass};

/// Top-level fields with no document semantics (view/recalculation state).
/// Stripped before structural comparison so a cursor move doesn't count as
/// user work.
const VOLATILE_FIELDS: &[&str] = &["editState", "recalcState"];

fn normalized(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut map = map.clone();
            for field in VOLATILE_FIELDS {
                map.remove(*field);
            }
            Value::Object(map)
        }
        other => other.clone(),
    }
}

/// Structural equality between live content and a seed workbook.
///
/// Deep value comparison, not string comparison, so key order and
/// whitespace differences don't read as user work. Content that isn't valid
/// JSON is always treated as user work.
pub fn is_template_content(live_raw: &str, seed: &Value) -> bool {
    match serde_json::from_str::<Value>(live_raw) {
        Ok(live) => normalized(&live) == normalized(seed),
        Err(_) => false,
    }
}

/// Snapshot the scratch slot if it holds real user work, then reset it to
/// the seed template.
///
/// Returns the snapshot's generated name, or `None` when the live content
/// still equals the seed and nothing needed saving. Idempotent: re-invoking
/// on an already-reset slot is a no-op. The snapshot and the reset are one
/// logical unit; a failed snapshot write aborts before the reset, and any
/// error here must reach the caller before a destination document loads.
pub async fn flush_scratch<B: StorageBackend>(
    store: &DocumentStore<B>,
    device: DeviceClass,
    live_raw: &str,
    bill_type: u32,
) -> Result<Option<String>> {
    if is_template_content(live_raw, template::seed_value(device)) {
        tracing::debug!("scratch slot holds template content, nothing to snapshot");
        return Ok(None);
    }

    let name = naming::available_untitled_name(store, Utc::now()).await?;
    let snapshot = DocumentRecord::from_raw(name.clone(), live_raw, bill_type);
    let reset = DocumentRecord::new(
        crate::record::SCRATCH_NAME,
        template::seed_content(device),
        DEFAULT_BILL_TYPE,
    );

    store.snapshot_and_reset(snapshot, reset).await?;
    tracing::info!(snapshot = %name, "scratch work preserved before slot reuse");
    Ok(Some(name))
}
