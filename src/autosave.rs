//! Turns a continuously changing form into well-timed draft saves.
//!
//! Four triggers feed the persistence service:
//! - data changes, debounced so a burst of edits becomes one write;
//! - step changes, saved immediately;
//! - the app leaving the foreground, saved immediately;
//! - `save_now`, which cancels any pending debounced save first.
//!
//! The coordinator does not serialize these saves against each other; each
//! one is an independent last-writer-wins call into the service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::AutoSaveOptions;
use crate::error::DraftResult;
use crate::lifecycle::LifecycleSignal;
use crate::persistence::{DraftSource, PersistenceService, StatusSubscription};
use crate::timer::DelaySlot;
use crate::types::{FormMetadata, FormSnapshot, HistoryEntry, SaveStatus};

/// What the host UI renders: refreshed on mount and after every save.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AutoSaveState {
    pub save_status: SaveStatus,
    pub last_saved: Option<DateTime<Utc>>,
    pub save_count: u64,
    pub completion_percentage: u8,
    pub has_saved_data: bool,
}

struct FormState {
    snapshot: FormSnapshot,
    step: u32,
    is_complete: bool,
    last_step: u32,
}

struct Inner {
    service: PersistenceService,
    options: AutoSaveOptions,
    form: Mutex<FormState>,
    state: Mutex<AutoSaveState>,
    debounce: DelaySlot,
    shutdown: CancellationToken,
    torn_down: AtomicBool,
    status_subscription: Mutex<Option<StatusSubscription>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Inner {
    fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Saves the most recently observed form. A no-op when auto-save is
    /// disabled or the coordinator is gone.
    async fn persist(&self) -> DraftResult<()> {
        if !self.options.enabled || self.is_torn_down() {
            return Ok(());
        }
        let (snapshot, step, is_complete) = {
            let form = lock(&self.form);
            (form.snapshot.clone(), form.step, form.is_complete)
        };
        let metadata = self
            .service
            .save_form_data(&snapshot, step, is_complete)
            .await?;
        self.refresh_after_save(&metadata).await;
        Ok(())
    }

    async fn refresh_after_save(&self, metadata: &FormMetadata) {
        let completion = self.service.get_form_completion_percentage().await;
        // A write that resolves after teardown must not touch host state.
        if self.is_torn_down() {
            return;
        }
        let mut state = lock(&self.state);
        state.last_saved = Some(metadata.last_saved);
        state.save_count = metadata.save_count;
        state.has_saved_data = true;
        state.completion_percentage = completion;
    }
}

/// Samples the coordinator's form without keeping it alive.
struct LiveForm(Weak<Inner>);

#[async_trait]
impl DraftSource for LiveForm {
    fn snapshot(&self) -> FormSnapshot {
        self.0
            .upgrade()
            .map(|inner| lock(&inner.form).snapshot.clone())
            .unwrap_or_default()
    }

    fn current_step(&self) -> u32 {
        self.0.upgrade().map_or(1, |inner| lock(&inner.form).step)
    }

    fn is_complete(&self) -> bool {
        self.0
            .upgrade()
            .is_some_and(|inner| lock(&inner.form).is_complete)
    }

    async fn on_saved(&self, metadata: &FormMetadata) {
        if let Some(inner) = self.0.upgrade() {
            inner.refresh_after_save(metadata).await;
        }
    }
}

/// One mounted form screen's view onto a shared [`PersistenceService`].
///
/// Dropping the coordinator tears it down.
pub struct AutoSaveCoordinator {
    inner: Arc<Inner>,
}

impl AutoSaveCoordinator {
    /// Primes the exposed state from storage without writing, then wires the
    /// status stream, the interval auto-save and (optionally) app-lifecycle
    /// saves. Must be called within a Tokio runtime.
    pub async fn mount(
        service: PersistenceService,
        snapshot: FormSnapshot,
        step: u32,
        is_complete: bool,
        options: AutoSaveOptions,
        lifecycle: Option<&LifecycleSignal>,
    ) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(AutoSaveState {
                save_status: service.get_save_status(),
                ..AutoSaveState::default()
            }),
            service,
            options,
            form: Mutex::new(FormState {
                snapshot,
                step,
                is_complete,
                last_step: step,
            }),
            debounce: DelaySlot::new(),
            shutdown: CancellationToken::new(),
            torn_down: AtomicBool::new(false),
            status_subscription: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let subscription = inner.service.on_save_status_change(move |status| {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.state).save_status = status;
            }
        });
        *lock(&inner.status_subscription) = Some(subscription);

        let coordinator = Self { inner };
        coordinator.prime().await;

        if coordinator.inner.options.enabled {
            coordinator
                .inner
                .service
                .start_auto_save(Arc::new(LiveForm(Arc::downgrade(&coordinator.inner))));
        }
        if coordinator.inner.options.save_on_app_background {
            if let Some(signal) = lifecycle {
                coordinator.listen_for_lifecycle(signal);
            }
        }
        debug!("auto-save coordinator mounted");
        coordinator
    }

    async fn prime(&self) {
        let service = &self.inner.service;
        let has_saved_data = service.has_saved_data().await;
        let metadata = service.get_metadata().await;
        let completion = service.get_form_completion_percentage().await;

        let mut state = lock(&self.inner.state);
        state.has_saved_data = has_saved_data;
        if let Some(metadata) = metadata {
            state.last_saved = Some(metadata.last_saved);
            state.save_count = metadata.save_count;
        }
        state.completion_percentage = completion;
    }

    fn listen_for_lifecycle(&self, signal: &LifecycleSignal) {
        let mut changes = signal.subscribe();
        let shutdown = self.inner.shutdown.clone();
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                let app_state = *changes.borrow_and_update();
                if !app_state.is_leaving_foreground() {
                    continue;
                }
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                debug!(%app_state, "app left foreground, saving draft");
                inner.debounce.cancel();
                if let Err(err) = inner.persist().await {
                    error!("Error saving on app background: {err}");
                }
            }
        });
    }

    /// Records the host's latest form. A step change saves immediately (when
    /// enabled); otherwise a data change (re)starts the debounce timer.
    pub async fn update(&self, snapshot: FormSnapshot, step: u32, is_complete: bool) {
        if self.inner.is_torn_down() {
            return;
        }
        let (data_changed, step_changed) = {
            let mut form = lock(&self.inner.form);
            let data_changed = form.snapshot != snapshot;
            let step_changed = form.last_step != step;
            form.snapshot = snapshot;
            form.step = step;
            form.is_complete = is_complete;
            if step_changed {
                form.last_step = step;
            }
            (data_changed, step_changed)
        };
        if !self.inner.options.enabled {
            return;
        }

        if step_changed && self.inner.options.save_on_step_change {
            self.inner.debounce.cancel();
            if let Err(err) = self.inner.persist().await {
                error!("Error saving on step change: {err}");
            }
        } else if data_changed {
            self.schedule_save();
        }
    }

    /// (Re)starts the debounce timer; only the last schedule in a quiet
    /// period writes, carrying the form as observed when the timer fires.
    pub fn schedule_save(&self) {
        if !self.inner.options.enabled || self.inner.is_torn_down() {
            return;
        }
        let (generation, token) = self.inner.debounce.arm();
        let delay = self.inner.options.debounce;
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.debounce.claim(generation) {
                return;
            }
            if let Err(err) = inner.persist().await {
                error!("Error in debounced save: {err}");
            }
        });
    }

    pub fn has_pending_save(&self) -> bool {
        self.inner.debounce.is_pending()
    }

    /// Cancels any pending debounced save and writes the current form now.
    pub async fn save_now(&self) -> DraftResult<()> {
        self.inner.debounce.cancel();
        self.inner.persist().await
    }

    pub fn state(&self) -> AutoSaveState {
        lock(&self.inner.state).clone()
    }

    pub async fn load_saved_data(&self) -> Option<FormSnapshot> {
        self.inner.service.load_form_data().await
    }

    pub async fn clear_saved_data(&self) -> DraftResult<()> {
        self.inner.service.clear_form_data().await?;
        let mut state = lock(&self.inner.state);
        state.has_saved_data = false;
        state.last_saved = None;
        state.save_count = 0;
        state.completion_percentage = 0;
        Ok(())
    }

    pub async fn get_save_history(&self) -> Vec<HistoryEntry> {
        self.inner.service.get_save_history().await
    }

    pub async fn restore_from_history(&self, index: usize) -> DraftResult<Option<FormSnapshot>> {
        let restored = self.inner.service.restore_from_history(index).await?;
        if restored.is_some() {
            if let Some(metadata) = self.inner.service.get_metadata().await {
                self.inner.refresh_after_save(&metadata).await;
            }
        }
        Ok(restored)
    }

    /// Cancels the debounce timer, drops the status subscription, stops the
    /// lifecycle listener and the service's interval auto-save. Idempotent.
    pub fn teardown(&self) {
        if self.inner.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.debounce.cancel();
        if let Some(subscription) = lock(&self.inner.status_subscription).take() {
            subscription.unsubscribe();
        }
        self.inner.shutdown.cancel();
        self.inner.service.stop_auto_save();
        debug!("auto-save coordinator torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.is_torn_down()
    }
}

impl Drop for AutoSaveCoordinator {
    fn drop(&mut self) {
        self.teardown();
    }
}
