use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

/// Foreground state of the host application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    #[default]
    Active,
    Background,
    Inactive,
}

impl AppState {
    /// Leaving the foreground is the moment a draft must hit storage.
    pub fn is_leaving_foreground(&self) -> bool {
        matches!(self, AppState::Background | AppState::Inactive)
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AppState::Active => "active",
            AppState::Background => "background",
            AppState::Inactive => "inactive",
        })
    }
}

/// Broadcasts app-state transitions from the host to any number of listeners.
#[derive(Clone, Debug)]
pub struct LifecycleSignal {
    sender: watch::Sender<AppState>,
}

impl Default for LifecycleSignal {
    fn default() -> Self {
        Self::new(AppState::Active)
    }
}

impl LifecycleSignal {
    pub fn new(initial: AppState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Records a transition; repeating the current state is not a change.
    pub fn set(&self, state: AppState) {
        self.sender.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    pub fn current(&self) -> AppState {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
