//! Durable, versioned storage of the single in-progress listing draft.
//!
//! A draft is three records in the key-value store: the merged snapshot, its
//! metadata and a bounded, most-recent-first history used for recovery.
//!
//! Concurrent `save_form_data` calls are not serialized. Each call reads the
//! stored snapshot, merges its partial over it and writes the result, so two
//! overlapping calls race and the last writer wins. Callers that need strict
//! ordering await each save before issuing the next.

mod migration;
mod status;

pub use migration::{Migration, MigrationOutcome, Migrator, default_migrations};
pub use status::{StatusCallback, StatusSubscription};

use async_trait::async_trait;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::PersistenceConfig;
use crate::error::{DraftError, DraftResult};
use crate::storage::KeyValueStore;
use crate::timer::DelaySlot;
use crate::types::{
    DraftState, ExportBundle, FormMetadata, FormSnapshot, HistoryEntry, LEGACY_SCHEMA_VERSION,
    SaveStatus,
};
use status::StatusHub;

/// Live view of the form that the interval auto-save samples on every tick.
#[async_trait]
pub trait DraftSource: Send + Sync {
    fn snapshot(&self) -> FormSnapshot;
    fn current_step(&self) -> u32;
    fn is_complete(&self) -> bool {
        false
    }

    /// Called after each successful interval save of this source.
    async fn on_saved(&self, _metadata: &FormMetadata) {}
}

struct Inner {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: PersistenceConfig,
    migrator: Migrator,
    status: Arc<StatusHub>,
    status_reset: DelaySlot,
    auto_save: DelaySlot,
}

/// Cheap-to-clone handle; clones share the store, status stream and timers.
#[derive(Clone)]
pub struct PersistenceService {
    inner: Arc<Inner>,
}

pub struct PersistenceServiceBuilder {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: PersistenceConfig,
    migrations: Option<Vec<Migration>>,
}

impl PersistenceServiceBuilder {
    pub fn config(mut self, config: PersistenceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn migrations(mut self, migrations: Vec<Migration>) -> Self {
        self.migrations = Some(migrations);
        self
    }

    pub fn build(self) -> DraftResult<PersistenceService> {
        self.config.validate()?;
        let migrator = Migrator::new(
            self.config.schema_version.clone(),
            self.migrations.unwrap_or_else(default_migrations),
        );
        Ok(PersistenceService {
            inner: Arc::new(Inner {
                store: self.store,
                clock: self.clock,
                config: self.config,
                migrator,
                status: Arc::new(StatusHub::default()),
                status_reset: DelaySlot::new(),
                auto_save: DelaySlot::new(),
            }),
        })
    }
}

impl PersistenceService {
    pub fn builder(store: Arc<dyn KeyValueStore>) -> PersistenceServiceBuilder {
        PersistenceServiceBuilder {
            store,
            clock: Arc::new(SystemClock),
            config: PersistenceConfig::default(),
            migrations: None,
        }
    }

    /// Service with the default configuration, system clock and migrations.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                clock: Arc::new(SystemClock),
                config: PersistenceConfig::default(),
                migrator: Migrator::default(),
                status: Arc::new(StatusHub::default()),
                status_reset: DelaySlot::new(),
                auto_save: DelaySlot::new(),
            }),
        }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.inner.config
    }

    pub(crate) fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.inner.clock.now()
    }

    fn store(&self) -> &dyn KeyValueStore {
        self.inner.store.as_ref()
    }

    // ── Status stream ────────────────────────────────────────────────────────

    /// Registers `callback` for every status transition. Callbacks run
    /// synchronously, in registration order.
    pub fn on_save_status_change<F>(&self, callback: F) -> StatusSubscription
    where
        F: Fn(SaveStatus) + Send + Sync + 'static,
    {
        self.inner.status.subscribe(Arc::new(callback))
    }

    pub fn get_save_status(&self) -> SaveStatus {
        self.inner.status.current()
    }

    fn schedule_status_reset(&self, expected: SaveStatus, after: Duration) {
        let (generation, token) = self.inner.status_reset.arm();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(after) => {}
            }
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.status_reset.claim(generation) {
                inner.status.publish_if(expected, SaveStatus::Idle);
            }
        });
    }

    // ── Save / load ──────────────────────────────────────────────────────────

    /// Merges `partial` over the stored snapshot and writes snapshot,
    /// metadata and a history entry. Broadcasts Saving then Saved, or Error
    /// before returning the failure.
    pub async fn save_form_data(
        &self,
        partial: &FormSnapshot,
        current_step: u32,
        is_complete: bool,
    ) -> DraftResult<FormMetadata> {
        self.inner.status_reset.cancel();
        self.inner.status.publish(SaveStatus::Saving);

        match self.write_draft(partial, current_step, is_complete).await {
            Ok(metadata) => {
                self.inner.status.publish(SaveStatus::Saved);
                self.schedule_status_reset(
                    SaveStatus::Saved,
                    self.inner.config.saved_status_visibility,
                );
                Ok(metadata)
            }
            Err(err) => {
                error!("Error saving form data: {err}");
                self.inner.status.publish(SaveStatus::Error);
                self.schedule_status_reset(
                    SaveStatus::Error,
                    self.inner.config.error_status_visibility,
                );
                Err(err)
            }
        }
    }

    async fn write_draft(
        &self,
        partial: &FormSnapshot,
        current_step: u32,
        is_complete: bool,
    ) -> DraftResult<FormMetadata> {
        let keys = &self.inner.config.keys;
        let merged = self
            .load_form_data()
            .await
            .unwrap_or_default()
            .merged(partial);
        let previous = self.get_metadata().await;

        let metadata = FormMetadata {
            last_saved: self.now(),
            current_step: current_step.max(1),
            version: self.inner.migrator.target().to_string(),
            save_count: previous.as_ref().map_or(0, |m| m.save_count) + 1,
            is_complete,
            user_id: previous.and_then(|m| m.user_id),
        };

        let data_json = serde_json::to_string(&merged)?;
        let metadata_json = serde_json::to_string(&metadata)?;
        tokio::try_join!(
            self.store().set_item(&keys.data, &data_json),
            self.store().set_item(&keys.metadata, &metadata_json),
        )?;

        self.append_history(HistoryEntry {
            data: merged,
            metadata: metadata.clone(),
        })
        .await;

        debug!(
            step = metadata.current_step,
            save_count = metadata.save_count,
            "draft saved"
        );
        Ok(metadata)
    }

    /// Reads the primary record without migrating it, telling a missing
    /// draft apart from one that no longer parses.
    pub async fn draft_state(&self) -> DraftResult<DraftState> {
        let Some(raw) = self.store().get_item(&self.inner.config.keys.data).await? else {
            return Ok(DraftState::Missing);
        };
        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                return Ok(DraftState::Corrupted {
                    reason: err.to_string(),
                });
            }
        };
        match FormSnapshot::try_from(value) {
            Ok(snapshot) => Ok(DraftState::Present(snapshot)),
            Err(other) => Ok(DraftState::Corrupted {
                reason: format!("expected a JSON object, found {other}"),
            }),
        }
    }

    /// Returns the stored snapshot after schema migration. Absent, unreadable
    /// and corrupted drafts all yield `None`.
    pub async fn load_form_data(&self) -> Option<FormSnapshot> {
        match self.draft_state().await {
            Ok(DraftState::Present(snapshot)) => Some(self.migrate(snapshot).await),
            Ok(DraftState::Missing) => None,
            Ok(DraftState::Corrupted { reason }) => {
                error!("Error loading form data: {reason}");
                None
            }
            Err(err) => {
                error!("Error loading form data: {err}");
                None
            }
        }
    }

    async fn migrate(&self, snapshot: FormSnapshot) -> FormSnapshot {
        let metadata = self.get_metadata().await;
        let version = metadata
            .as_ref()
            .map_or(LEGACY_SCHEMA_VERSION, |m| m.version.as_str());

        let (migrated, outcome) = self.inner.migrator.migrate(version, snapshot);
        match outcome {
            MigrationOutcome::UpToDate => {}
            MigrationOutcome::Migrated { from, to } => {
                info!(%from, %to, "migrated stored draft");
                if let Some(mut metadata) = metadata {
                    metadata.version = to;
                    if let Err(err) = self.write_metadata(&metadata).await {
                        warn!("Could not stamp migrated schema version: {err}");
                    }
                }
            }
            MigrationOutcome::Unknown { version } => {
                warn!(%version, "no migration path for stored draft, loading as-is");
            }
        }
        migrated
    }

    async fn write_metadata(&self, metadata: &FormMetadata) -> DraftResult<()> {
        let json = serde_json::to_string(metadata)?;
        self.store()
            .set_item(&self.inner.config.keys.metadata, &json)
            .await
    }

    /// Stored metadata, or `None` when absent or malformed.
    pub async fn get_metadata(&self) -> Option<FormMetadata> {
        let raw = match self.store().get_item(&self.inner.config.keys.metadata).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                error!("Error loading form metadata: {err}");
                return None;
            }
        };
        serde_json::from_str(&raw)
            .map_err(|err| error!("Error parsing form metadata: {err}"))
            .ok()
    }

    /// Removes snapshot, metadata and history. The snapshot and metadata
    /// deletes run concurrently and are not atomic: a failure part-way leaves
    /// whichever record survived.
    pub async fn clear_form_data(&self) -> DraftResult<()> {
        let keys = &self.inner.config.keys;
        futures::future::try_join(
            self.store().remove_item(&keys.data),
            self.store().remove_item(&keys.metadata),
        )
        .await
        .map_err(|err| {
            error!("Error clearing form data: {err}");
            err
        })?;

        if let Err(err) = self.store().remove_item(&keys.history).await {
            warn!("Error clearing history: {err}");
        }

        self.inner.status_reset.cancel();
        self.inner.status.publish(SaveStatus::Idle);
        Ok(())
    }

    /// Existence check on the snapshot record only.
    pub async fn has_saved_data(&self) -> bool {
        match self.store().get_item(&self.inner.config.keys.data).await {
            Ok(data) => data.is_some(),
            Err(err) => {
                error!("Error checking for saved data: {err}");
                false
            }
        }
    }

    pub async fn get_last_saved_step(&self) -> u32 {
        self.get_metadata().await.map_or(1, |m| m.current_step)
    }

    pub async fn get_form_completion_percentage(&self) -> u8 {
        self.load_form_data()
            .await
            .map_or(0, |snapshot| snapshot.completion_percentage())
    }

    // ── Interval auto-save ───────────────────────────────────────────────────

    /// Saves `source` every `auto_save_interval`, first one full interval
    /// after the call, skipping ticks where the form has no identifying data.
    /// Replaces any previously running interval. Failures are logged and the
    /// interval keeps running. Must be called within a Tokio runtime.
    pub fn start_auto_save(&self, source: Arc<dyn DraftSource>) {
        let (_, token) = self.inner.auto_save.arm();
        let period = self.inner.config.auto_save_interval;
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let service = PersistenceService { inner };
                let snapshot = source.snapshot();
                if !snapshot.has_minimal_data() {
                    debug!("auto-save skipped: no identifying data yet");
                    continue;
                }
                match service
                    .save_form_data(&snapshot, source.current_step(), source.is_complete())
                    .await
                {
                    Ok(metadata) => source.on_saved(&metadata).await,
                    Err(err) => error!("Auto-save error: {err}"),
                }
            }
            debug!("auto-save interval stopped");
        });
    }

    /// Stops the interval and any pending status reset.
    pub fn stop_auto_save(&self) {
        self.inner.auto_save.cancel();
        self.inner.status_reset.cancel();
    }

    pub fn is_auto_saving(&self) -> bool {
        self.inner.auto_save.is_pending()
    }

    // ── History ──────────────────────────────────────────────────────────────

    async fn append_history(&self, entry: HistoryEntry) {
        if let Err(err) = self.try_append_history(entry).await {
            warn!("Error saving to history: {err}");
        }
    }

    async fn try_append_history(&self, entry: HistoryEntry) -> DraftResult<()> {
        let key = &self.inner.config.keys.history;
        let mut history: Vec<HistoryEntry> = match self.store().get_item(key).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!("Discarding unreadable save history: {err}");
                Vec::new()
            }),
            None => Vec::new(),
        };
        history.insert(0, entry);
        history.truncate(self.inner.config.max_history);
        self.write_history(&history).await
    }

    async fn write_history(&self, history: &[HistoryEntry]) -> DraftResult<()> {
        let json = serde_json::to_string(history)?;
        self.store()
            .set_item(&self.inner.config.keys.history, &json)
            .await
    }

    /// Most-recent-first history; empty when absent or unreadable.
    pub async fn get_save_history(&self) -> Vec<HistoryEntry> {
        let raw = match self.store().get_item(&self.inner.config.keys.history).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                error!("Error loading save history: {err}");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            error!("Error parsing save history: {err}");
            Vec::new()
        })
    }

    /// Re-saves history entry `index` as the current draft and returns its
    /// data. `Ok(None)` when `index` is out of range.
    pub async fn restore_from_history(&self, index: usize) -> DraftResult<Option<FormSnapshot>> {
        let history = self.get_save_history().await;
        let Some(entry) = history.into_iter().nth(index) else {
            return Ok(None);
        };
        self.save_form_data(
            &entry.data,
            entry.metadata.current_step,
            entry.metadata.is_complete,
        )
        .await?;
        info!(index, "restored draft from history");
        Ok(Some(entry.data))
    }

    // ── Backup ───────────────────────────────────────────────────────────────

    pub async fn export_form_data(&self) -> DraftResult<String> {
        let bundle = ExportBundle {
            form_data: self.load_form_data().await,
            metadata: self.get_metadata().await,
            history: Some(self.get_save_history().await),
            exported_at: Some(self.now()),
        };
        Ok(serde_json::to_string_pretty(&bundle)?)
    }

    /// Re-saves `formData` (if any) and replaces history wholesale when the
    /// document carries one.
    pub async fn import_form_data(&self, json: &str) -> DraftResult<()> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(DraftError::Import("expected a JSON object".into()));
        }
        let bundle: ExportBundle = serde_json::from_value(value)?;

        if let Some(form_data) = &bundle.form_data {
            let (step, complete) = bundle
                .metadata
                .as_ref()
                .map_or((1, false), |m| (m.current_step, m.is_complete));
            self.save_form_data(form_data, step, complete).await?;
        }

        if let Some(history) = &bundle.history {
            let mut history = history.clone();
            history.truncate(self.inner.config.max_history);
            self.write_history(&history).await.map_err(|err| {
                error!("Error importing form data: {err}");
                err
            })?;
        }
        Ok(())
    }
}
