use thiserror::Error;
use tokio::io;

pub type DraftResult<T> = core::result::Result<T, DraftError>;

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Failure reported by a storage backend that is not a plain I/O error
    /// (quota exceeded, injected failure, remote store rejection).
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Invalid import document: {0}")]
    Import(String),
    #[error("Background task failed: {0}")]
    Task(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DraftError {
    pub fn storage(message: impl Into<String>) -> Self {
        DraftError::Storage(message.into())
    }
}
