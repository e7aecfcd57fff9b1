use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::KeyValueStore;
use crate::error::{DraftError, DraftResult};

/// In-process store backed by a `HashMap`. Cheap to construct, used by tests
/// and by hosts that bring their own durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> DraftResult<MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|e| DraftError::storage(format!("memory store poisoned: {e}")))
    }

    /// Raw view of every key, used by tests and the CLI `status` output.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .items()
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> DraftResult<Option<String>> {
        Ok(self.items()?.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> DraftResult<()> {
        self.items()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> DraftResult<()> {
        self.items()?.remove(key);
        Ok(())
    }
}
