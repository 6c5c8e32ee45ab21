//! invoice-store: Local document store for a spreadsheet-backed invoice
//! editor.
//!
//! This crate provides the core functionality for:
//! - Persisting named invoice documents over a pluggable storage backend
//! - The scratch-slot lifecycle (snapshot unsaved work before slot reuse)
//! - Filename validation and `Untitled-<timestamp>` generation
//! - Debounced single-flight autosave
//! - The consolidated editor session views call into

pub mod autosave;
pub mod backend;
pub mod engine;
pub mod error;
pub mod events;
pub mod naming;
pub mod record;
pub mod scratch;
pub mod store;
pub mod template;
pub mod workspace;

pub use autosave::{Autosave, DEFAULT_QUIET_PERIOD};
pub use backend::{BackendError, DirBackend, MemoryBackend, StorageBackend};
pub use engine::{InMemoryEngine, SheetEngine};
pub use error::StoreError;
pub use events::{EventBus, StoreEvent, Subscription};
pub use naming::{NameError, validate_name};
pub use record::{DEFAULT_BILL_TYPE, DocumentRecord, FileMeta, SCRATCH_NAME, SortBy};
pub use store::DocumentStore;
pub use template::DeviceClass;
pub use workspace::Workspace;
