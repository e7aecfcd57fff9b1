#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use listing_draft::{
    DraftError, DraftResult, DraftSource, FormSnapshot, KeyValueStore, MemoryStore,
    PersistenceService, SaveStatus, StatusSubscription,
};

/// Memory store that counts writes per key and can be told to reject writes.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    writes: Mutex<HashMap<String, usize>>,
    failing: AtomicBool,
    failing_keys: Mutex<HashSet<String>>,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn writes_to(&self, key: &str) -> usize {
        self.writes.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Rejects writes to `key` only.
    pub fn fail_writes_to(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl KeyValueStore for CountingStore {
    async fn get_item(&self, key: &str) -> DraftResult<Option<String>> {
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> DraftResult<()> {
        let rejected = self.failing.load(Ordering::SeqCst)
            || self.failing_keys.lock().unwrap().contains(key);
        if rejected {
            return Err(DraftError::storage("quota exceeded"));
        }
        *self.writes.lock().unwrap().entry(key.to_string()).or_default() += 1;
        self.inner.set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> DraftResult<()> {
        self.inner.remove_item(key).await
    }
}

/// Store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get_item(&self, _key: &str) -> DraftResult<Option<String>> {
        Err(DraftError::storage("store unavailable"))
    }

    async fn set_item(&self, _key: &str, _value: &str) -> DraftResult<()> {
        Err(DraftError::storage("store unavailable"))
    }

    async fn remove_item(&self, _key: &str) -> DraftResult<()> {
        Err(DraftError::storage("store unavailable"))
    }
}

/// Fixed form state sampled by the interval auto-save.
pub struct StaticForm {
    pub snapshot: Mutex<FormSnapshot>,
    pub step: u32,
}

impl StaticForm {
    pub fn new(snapshot: FormSnapshot, step: u32) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(snapshot),
            step,
        })
    }
}

impl DraftSource for StaticForm {
    fn snapshot(&self) -> FormSnapshot {
        self.snapshot.lock().unwrap().clone()
    }

    fn current_step(&self) -> u32 {
        self.step
    }
}

pub fn named(name: &str) -> FormSnapshot {
    FormSnapshot::new().with("name", name)
}

/// Records every status transition the service broadcasts.
pub fn record_statuses(
    service: &PersistenceService,
) -> (Arc<Mutex<Vec<SaveStatus>>>, StatusSubscription) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let subscription =
        service.on_save_status_change(move |status| sink.lock().unwrap().push(status));
    (log, subscription)
}
