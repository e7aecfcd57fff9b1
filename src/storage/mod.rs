//! String-keyed asynchronous storage used by the persistence service.
//!
//! The store offers no transactional guarantees across keys: callers that
//! write several keys for one logical update must tolerate partial writes.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::DraftResult;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns `Ok(None)` when the key has never been written or was removed.
    async fn get_item(&self, key: &str) -> DraftResult<Option<String>>;

    async fn set_item(&self, key: &str, value: &str) -> DraftResult<()>;

    /// Removing a missing key is not an error.
    async fn remove_item(&self, key: &str) -> DraftResult<()>;
}
