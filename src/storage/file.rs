use async_trait::async_trait;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::KeyValueStore;
use crate::error::{DraftError, DraftResult};

/// Disambiguates temp files of overlapping writes to the same key.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go through a temporary file, `fsync` and an atomic rename so a
/// crash never leaves a half-written record behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data dir>/listing-draft`, falling back to the working directory when
    /// the platform has no data dir.
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("listing-draft")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> DraftResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(DraftError::storage(format!("invalid storage key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn write_atomic(path: &Path, value: &str) -> DraftResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let temp = path.with_extension(format!("json.{}.{seq}.tmp", std::process::id()));
        let written = fs::File::create(&temp).and_then(|mut f| {
            f.write_all(value.as_bytes())?;
            f.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&temp, path)) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(())
    }
}

async fn blocking<T, F>(job: F) -> DraftResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> DraftResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| DraftError::Task(format!("spawn_blocking failed: {e}")))?
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_item(&self, key: &str) -> DraftResult<Option<String>> {
        let path = self.path_for(key)?;
        blocking(move || match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn set_item(&self, key: &str, value: &str) -> DraftResult<()> {
        let path = self.path_for(key)?;
        let value = value.to_string();
        blocking(move || FileStore::write_atomic(&path, &value)).await
    }

    async fn remove_item(&self, key: &str) -> DraftResult<()> {
        let path = self.path_for(key)?;
        blocking(move || match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.get_item("draft").await.unwrap(), None);
        store.set_item("draft", r#"{"name":"Deli"}"#).await.unwrap();
        assert_eq!(
            store.get_item("draft").await.unwrap().as_deref(),
            Some(r#"{"name":"Deli"}"#)
        );
        assert!(dir.path().join("nested/draft.json").exists());


        store.remove_item("draft").await.unwrap();
        store.remove_item("draft").await.unwrap();
        assert_eq!(store.get_item("draft").await.unwrap(), None);
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn overlapping_writes_to_one_key_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let long = format!(r#"{{"name":"{}"}}"#, "x".repeat(64 * 1024));
        let short = r#"{"name":"Deli"}"#;

        for _ in 0..50 {
            let (a, b) = tokio::join!(
                store.set_item("draft", &long),
                store.set_item("draft", short)
            );
            a.unwrap();
            b.unwrap();
            let stored = store.get_item("draft").await.unwrap().unwrap();
            assert!(stored == long || stored == short);
        }
        assert_eq!(entries(dir.path()), ["draft.json"]);
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.set_item("../escape", "x").await.is_err());
        assert!(store.get_item("").await.is_err());
    }
}
