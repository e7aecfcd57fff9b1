//! Draft persistence, auto-save and validation for multi-step business
//! listing submissions.
//!
//! - [`persistence::PersistenceService`] owns the stored draft: merge-on-save,
//!   metadata, bounded history, schema migration, export/import and the save
//!   status stream.
//! - [`autosave::AutoSaveCoordinator`] turns form edits, step changes and app
//!   lifecycle events into saves.
//! - [`validation::ValidationEngine`] evaluates the listing rules per field,
//!   step and form.

pub mod autosave;
pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod persistence;
pub mod storage;
mod timer;
pub mod types;
pub mod validation;

pub mod metadata {
    include!(concat!(env!("OUT_DIR"), "/pkg_info.rs"));
}

pub use autosave::{AutoSaveCoordinator, AutoSaveState};
pub use config::{AutoSaveOptions, PersistenceConfig, StorageKeys};
pub use error::{DraftError, DraftResult};
pub use lifecycle::{AppState, LifecycleSignal};
pub use persistence::{DraftSource, PersistenceService, StatusSubscription};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::{DraftState, ExportBundle, FormMetadata, FormSnapshot, HistoryEntry, SaveStatus};
pub use validation::{ValidationEngine, ValidationTrigger};
