use std::time::Duration;

use crate::error::{DraftError, DraftResult};

pub const DEFAULT_NAMESPACE: &str = "add_eatery";
pub const CURRENT_SCHEMA_VERSION: &str = "1.1.0";
pub const AUTO_SAVE_INTERVAL: Duration = Duration::from_secs(30);
pub const SAVED_STATUS_VISIBILITY: Duration = Duration::from_secs(2);
pub const ERROR_STATUS_VISIBILITY: Duration = Duration::from_secs(3);
pub const MAX_SAVE_HISTORY: usize = 5;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// The three records that make up one persisted draft.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageKeys {
    pub data: String,
    pub metadata: String,
    pub history: String,
}

impl StorageKeys {
    pub fn for_namespace(namespace: &str) -> Self {
        let data = format!("{namespace}_form_data");
        Self {
            history: format!("{data}_history"),
            metadata: format!("{namespace}_form_metadata"),
            data,
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::for_namespace(DEFAULT_NAMESPACE)
    }
}

#[derive(Clone, Debug)]
pub struct PersistenceConfig {
    pub keys: StorageKeys,
    pub auto_save_interval: Duration,
    pub saved_status_visibility: Duration,
    pub error_status_visibility: Duration,
    pub max_history: usize,
    pub schema_version: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            keys: StorageKeys::default(),
            auto_save_interval: AUTO_SAVE_INTERVAL,
            saved_status_visibility: SAVED_STATUS_VISIBILITY,
            error_status_visibility: ERROR_STATUS_VISIBILITY,
            max_history: MAX_SAVE_HISTORY,
            schema_version: CURRENT_SCHEMA_VERSION.to_string(),
        }
    }
}

impl PersistenceConfig {
    pub fn with_namespace(namespace: &str) -> Self {
        Self {
            keys: StorageKeys::for_namespace(namespace),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> DraftResult<()> {
        if self.max_history == 0 {
            return Err(DraftError::Config("max_history must be at least 1".into()));
        }
        if self.auto_save_interval.is_zero() {
            return Err(DraftError::Config(
                "auto_save_interval must be greater than zero".into(),
            ));
        }
        let keys = [&self.keys.data, &self.keys.metadata, &self.keys.history];
        if keys.iter().any(|k| k.trim().is_empty()) {
            return Err(DraftError::Config("storage keys cannot be empty".into()));
        }
        if keys[0] == keys[1] || keys[0] == keys[2] || keys[1] == keys[2] {
            return Err(DraftError::Config("storage keys must be distinct".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct AutoSaveOptions {
    pub enabled: bool,
    pub save_on_app_background: bool,
    pub save_on_step_change: bool,
    pub debounce: Duration,
}

impl Default for AutoSaveOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            save_on_app_background: true,
            save_on_step_change: true,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keys_match_legacy_layout() {
        let keys = StorageKeys::default();
        assert_eq!(keys.data, "add_eatery_form_data");
        assert_eq!(keys.metadata, "add_eatery_form_metadata");
        assert_eq!(keys.history, "add_eatery_form_data_history");
    }

    #[test]
    fn validate_rejects_zero_history() {
        let config = PersistenceConfig {
            max_history: 0,
            ..PersistenceConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(PersistenceConfig::with_namespace("mikvah").validate().is_ok());
    }
}
