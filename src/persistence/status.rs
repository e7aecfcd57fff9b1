use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::types::SaveStatus;

pub type StatusCallback = Arc<dyn Fn(SaveStatus) + Send + Sync>;

/// Current save status plus the observers that hear about every change.
#[derive(Default)]
pub(crate) struct StatusHub {
    current: Mutex<SaveStatus>,
    observers: Mutex<Vec<(u64, StatusCallback)>>,
    next_id: AtomicU64,
}

impl StatusHub {
    pub(crate) fn current(&self) -> SaveStatus {
        *lock(&self.current)
    }

    pub(crate) fn subscribe(self: &Arc<Self>, callback: StatusCallback) -> StatusSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.observers).push((id, callback));
        StatusSubscription {
            hub: Arc::downgrade(self),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Stores `status` and notifies observers in registration order.
    /// Callbacks run outside the lock so they may unsubscribe themselves.
    pub(crate) fn publish(&self, status: SaveStatus) {
        *lock(&self.current) = status;
        tracing::debug!(status = %status, "save status changed");
        let observers: Vec<StatusCallback> = lock(&self.observers)
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in observers {
            callback(status);
        }
    }

    /// Publishes `next` only while the status is still `expected`.
    pub(crate) fn publish_if(&self, expected: SaveStatus, next: SaveStatus) -> bool {
        if self.current() != expected {
            return false;
        }
        self.publish(next);
        true
    }

    fn remove(&self, id: u64) {
        lock(&self.observers).retain(|(observer, _)| *observer != id);
    }

    pub(crate) fn observer_count(&self) -> usize {
        lock(&self.observers).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle returned by `on_save_status_change`. Dropping it unsubscribes;
/// `unsubscribe` may be called any number of times.
#[must_use = "dropping the subscription unsubscribes the callback"]
pub struct StatusSubscription {
    hub: Weak<StatusHub>,
    id: u64,
    active: AtomicBool,
}

impl StatusSubscription {
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for StatusSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusSubscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
