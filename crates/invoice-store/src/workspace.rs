//! The editor session: one consolidated implementation of the save / open /
//! switch flows the views call into.
//!
//! Selection and bill type live here as an explicit session object with
//! defined initialization (`bootstrap`) and no global state. Every flow that
//! leaves the scratch slot goes through the same snapshot policy, so no view
//! can forget it.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use crate::autosave::Autosave;
use crate::backend::StorageBackend;
use crate::engine::SheetEngine;
use crate::error::{Result, StoreError};
use crate::events::{EventBus, StoreEvent};
use crate::naming::{self, NameError};
use crate::record::{DEFAULT_BILL_TYPE, DocumentRecord, FileMeta, SCRATCH_NAME, SortBy};
use crate::scratch;
use crate::store::DocumentStore;
use crate::template::{self, DeviceClass};

struct SessionState {
    selected: String,
    bill_type: u32,
}

/// An editing session over a document store and a spreadsheet engine.
pub struct Workspace<B: StorageBackend> {
    store: DocumentStore<B>,
    device: DeviceClass,
    engine: Arc<dyn SheetEngine>,
    events: Arc<EventBus>,
    session: StdMutex<SessionState>,
}

impl<B: StorageBackend> Workspace<B> {
    pub fn new(store: DocumentStore<B>, device: DeviceClass, engine: Arc<dyn SheetEngine>) -> Self {
        Self {
            store,
            device,
            engine,
            events: Arc::new(EventBus::new()),
            session: StdMutex::new(SessionState {
                selected: SCRATCH_NAME.to_string(),
                bill_type: DEFAULT_BILL_TYPE,
            }),
        }
    }

    pub fn store(&self) -> &DocumentStore<B> {
        &self.store
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    /// Name of the currently open document.
    pub fn selected_file(&self) -> String {
        self.session.lock().unwrap().selected.clone()
    }

    pub fn bill_type(&self) -> u32 {
        self.session.lock().unwrap().bill_type
    }

    /// Switch the footer variant for the live document.
    pub fn set_bill_type(&self, bill_type: u32) {
        self.session.lock().unwrap().bill_type = bill_type;
    }

    /// Currently open name and live engine content, for callers that prefer
    /// live content over the stored snapshot (e.g. pushing to the server).
    pub fn live(&self) -> (String, String) {
        (self.selected_file(), self.engine.content())
    }

    fn select(&self, name: &str, bill_type: u32) {
        let mut session = self.session.lock().unwrap();
        session.selected = name.to_string();
        session.bill_type = bill_type;
    }

    /// First-run seeding of the scratch slot, or loading the persisted one.
    pub async fn bootstrap(&self) -> Result<()> {
        if self.store.exists(SCRATCH_NAME).await? {
            let record = self.store.get(SCRATCH_NAME).await?;
            self.engine.initialize(&record.decoded_content()?);
            self.select(SCRATCH_NAME, record.bill_type);
            tracing::debug!("loaded existing scratch document");
        } else {
            let seed = template::seed_raw(self.device);
            self.engine.initialize(&seed);
            self.store
                .put(DocumentRecord::new(
                    SCRATCH_NAME,
                    template::seed_content(self.device),
                    DEFAULT_BILL_TYPE,
                ))
                .await?;
            self.select(SCRATCH_NAME, DEFAULT_BILL_TYPE);
            tracing::info!("seeded scratch document from template");
        }
        Ok(())
    }

    /// Run the scratch snapshot policy if the scratch slot is open.
    ///
    /// Called by every flow that moves the session off the scratch slot.
    /// Errors propagate before any destination document loads.
    async fn flush_scratch_if_selected(&self) -> Result<()> {
        if self.selected_file() != SCRATCH_NAME {
            return Ok(());
        }
        let live = self.engine.content();
        if let Some(name) =
            scratch::flush_scratch(&self.store, self.device, &live, self.bill_type()).await?
        {
            self.set_bill_type(DEFAULT_BILL_TYPE);
            self.events.emit(StoreEvent::ScratchSnapshotted { name });
        }
        Ok(())
    }

    /// Open a document. Encrypted documents need
    /// [`open_with_password`](Self::open_with_password).
    pub async fn open(&self, name: &str) -> Result<()> {
        self.open_inner(name, None).await
    }

    /// Open a password-protected document.
    pub async fn open_with_password(&self, name: &str, password: &str) -> Result<()> {
        self.open_inner(name, Some(password)).await
    }

    async fn open_inner(&self, name: &str, password: Option<&str>) -> Result<()> {
        self.flush_scratch_if_selected().await?;

        let record = match password {
            Some(pw) => self.store.get_with_password(name, pw).await?,
            None => {
                let record = self.store.get(name).await?;
                if record.is_encrypted {
                    return Err(StoreError::WrongPassword(name.to_string()));
                }
                record
            }
        };

        self.engine.load(name, &record.decoded_content()?);
        self.select(name, record.bill_type);
        tracing::debug!(name = %name, "opened document");
        Ok(())
    }

    /// Start a fresh scratch document, preserving unsaved scratch work first.
    pub async fn new_file(&self) -> Result<()> {
        self.flush_scratch_if_selected().await?;

        let seed = template::seed_raw(self.device);
        self.engine.load(SCRATCH_NAME, &seed);
        // normalize the stored slot even when nothing was snapshotted
        self.store
            .put(DocumentRecord::new(
                SCRATCH_NAME,
                template::seed_content(self.device),
                DEFAULT_BILL_TYPE,
            ))
            .await?;
        self.select(SCRATCH_NAME, DEFAULT_BILL_TYPE);
        Ok(())
    }

    /// Explicit save of the currently open named document.
    ///
    /// The scratch slot has no explicit save; Save As is the way out of it.
    pub async fn save(&self) -> Result<()> {
        let selected = self.selected_file();
        if selected == SCRATCH_NAME {
            return Err(StoreError::ValidationRejected(NameError::Reserved(
                selected,
            )));
        }

        let mut record = self.store.get(&selected).await?;
        record.content = urlencoding::encode(&self.engine.content()).into_owned();
        record.bill_type = self.bill_type();
        record.touch();
        self.store.put(record).await?;

        self.events.emit(StoreEvent::DocumentSaved {
            name: selected.clone(),
        });
        Ok(())
    }

    /// Save the live document under a new name and select it.
    pub async fn save_as(&self, name: &str, password: Option<&str>) -> Result<()> {
        let validated = naming::validate_new_name(&self.store, name, None).await?;
        let content = self.engine.content();
        let bill_type = self.bill_type();

        let record = match password {
            Some(pw) => DocumentRecord::encrypted(validated.clone(), &content, bill_type, pw),
            None => DocumentRecord::from_raw(validated.clone(), &content, bill_type),
        };
        self.store.put(record).await?;

        self.select(&validated, bill_type);
        self.events.emit(StoreEvent::DocumentSaved { name: validated });
        Ok(())
    }

    /// The debounced autosave target: overwrite the open document in place.
    ///
    /// The scratch slot is rewritten wholesale; named documents keep their
    /// creation timestamp and protection.
    pub async fn autosave_now(&self) -> Result<()> {
        let selected = self.selected_file();
        let content = self.engine.content();

        if selected == SCRATCH_NAME {
            self.store
                .put(DocumentRecord::from_raw(
                    SCRATCH_NAME,
                    &content,
                    self.bill_type(),
                ))
                .await?;
            return Ok(());
        }

        let mut record = self.store.get(&selected).await?;
        record.content = urlencoding::encode(&content).into_owned();
        record.bill_type = self.bill_type();
        record.touch();
        self.store.put(record).await
    }

    /// Wire a debounced autosave loop to this workspace.
    ///
    /// Call [`Autosave::mark_dirty`] from the engine's content-change
    /// notification. Failures surface as `AutosaveFailed` events; the
    /// in-memory document stays editable.
    pub fn start_autosave(self: &Arc<Self>, quiet: Duration) -> Autosave
    where
        B: 'static,
    {
        let workspace = Arc::clone(self);
        Autosave::spawn(quiet, move || {
            let workspace = Arc::clone(&workspace);
            async move {
                if let Err(err) = workspace.autosave_now().await {
                    workspace.events.emit(StoreEvent::AutosaveFailed {
                        name: workspace.selected_file(),
                        reason: err.to_string(),
                    });
                    return Err(err);
                }
                Ok(())
            }
        })
    }

    /// Delete a document. Deleting the open one falls back to the scratch
    /// slot.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.store.delete(name).await?;
        self.events.emit(StoreEvent::DocumentDeleted {
            name: name.to_string(),
        });

        if self.selected_file() == name {
            match self.store.get(SCRATCH_NAME).await {
                Ok(record) => {
                    self.engine.load(SCRATCH_NAME, &record.decoded_content()?);
                    self.select(SCRATCH_NAME, record.bill_type);
                }
                Err(StoreError::NotFound(_)) => {
                    // scratch slot missing entirely; reseed it
                    self.engine.load(SCRATCH_NAME, &template::seed_raw(self.device));
                    self.store
                        .put(DocumentRecord::new(
                            SCRATCH_NAME,
                            template::seed_content(self.device),
                            DEFAULT_BILL_TYPE,
                        ))
                        .await?;
                    self.select(SCRATCH_NAME, DEFAULT_BILL_TYPE);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Rename a document, fixing up the selection if it was open.
    pub async fn rename(&self, old: &str, new: &str) -> Result<()> {
        if old == SCRATCH_NAME {
            return Err(StoreError::ValidationRejected(NameError::Reserved(
                old.to_string(),
            )));
        }
        let validated = naming::validate_new_name(&self.store, new, Some(old)).await?;
        if validated == old {
            return Ok(());
        }

        self.store.rename(old, &validated).await?;

        if self.selected_file() == old {
            let bill_type = self.bill_type();
            self.select(&validated, bill_type);
        }
        self.events.emit(StoreEvent::DocumentRenamed {
            from: old.to_string(),
            to: validated,
        });
        Ok(())
    }

    /// Every saved document except the scratch slot, most recently modified
    /// first.
    pub async fn list_saved(&self) -> Result<Vec<FileMeta>> {
        let mut metas: Vec<FileMeta> = self
            .store
            .list_all()
            .await?
            .values()
            .filter(|record| record.name != SCRATCH_NAME)
            .map(FileMeta::from)
            .collect();
        crate::record::sort_metas(&mut metas, SortBy::Modified);
        Ok(metas)
    }
}
