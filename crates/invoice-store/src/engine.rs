//! Spreadsheet engine collaborator.
//!
//! The engine is an opaque content source/sink: the store never parses what
//! it produces. UI shells provide the real implementation; `InMemoryEngine`
//! backs the tests.

use std::sync::Mutex;

/// The spreadsheet engine as the store sees it.
pub trait SheetEngine: Send + Sync {
    /// Serialized state of the live document.
    fn content(&self) -> String;

    /// Load a document into the view.
    fn load(&self, name: &str, content: &str);

    /// First-time engine setup with initial content.
    fn initialize(&self, content: &str);

    fn undo(&self);

    fn redo(&self);
}

/// In-memory engine for testing.
pub struct InMemoryEngine {
    content: Mutex<String>,
    loaded: Mutex<Option<String>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self {
            content: Mutex::new(String::new()),
            loaded: Mutex::new(None),
        }
    }

    /// Simulate the user editing the live document.
    pub fn set_content(&self, content: &str) {
        *self.content.lock().unwrap() = content.to_string();
    }

    /// Name of the document most recently loaded into the view.
    pub fn loaded_name(&self) -> Option<String> {
        self.loaded.lock().unwrap().clone()
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetEngine for InMemoryEngine {
    fn content(&self) -> String {
        self.content.lock().unwrap().clone()
    }

    fn load(&self, name: &str, content: &str) {
        *self.content.lock().unwrap() = content.to_string();
        *self.loaded.lock().unwrap() = Some(name.to_string());
    }

    fn initialize(&self, content: &str) {
        *self.content.lock().unwrap() = content.to_string();
    }

    fn undo(&self) {}

    fn redo(&self) {}
}
