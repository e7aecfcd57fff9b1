use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

struct Pending {
    generation: u64,
    token: CancellationToken,
}

/// Holds at most one pending scheduled action.
///
/// `arm` supersedes whatever was pending, `cancel` drops it, and a task that
/// finished waiting must `claim` its generation before acting so that a
/// cancel racing with the wake-up still wins.
#[derive(Default)]
pub(crate) struct DelaySlot {
    pending: Mutex<Option<Pending>>,
    next_generation: AtomicU64,
}

impl DelaySlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn arm(&self) -> (u64, CancellationToken) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        let previous = self.with_pending(|pending| {
            pending.replace(Pending {
                generation,
                token: token.clone(),
            })
        });
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        (generation, token)
    }

    /// Returns true when something was pending.
    pub(crate) fn cancel(&self) -> bool {
        match self.with_pending(Option::take) {
            Some(previous) => {
                previous.token.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn claim(&self, generation: u64) -> bool {
        self.with_pending(|pending| {
            if pending.as_ref().is_some_and(|p| p.generation == generation) {
                pending.take();
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.with_pending(|pending| pending.is_some())
    }

    fn with_pending<R>(&self, f: impl FnOnce(&mut Option<Pending>) -> R) -> R {
        let mut guard = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arming_supersedes_previous() {
        let slot = DelaySlot::new();
        let (first, first_token) = slot.arm();
        let (second, second_token) = slot.arm();
        assert!(first_token.is_cancelled());
        assert!(!second_token.is_cancelled());
        assert!(!slot.claim(first));
        assert!(slot.claim(second));
        assert!(!slot.is_pending());
    }

    #[test]
    fn cancel_beats_late_claim() {
        let slot = DelaySlot::new();
        let (generation, token) = slot.arm();
        assert!(slot.cancel());
        assert!(token.is_cancelled());
        assert!(!slot.claim(generation));
        assert!(!slot.cancel());
    }
}
