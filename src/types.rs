use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Fields that identify a listing well enough to be worth persisting from the
/// interval timer.
pub const IDENTIFYING_FIELDS: [&str; 5] = [
    "name",
    "address",
    "phone",
    "business_email",
    "short_description",
];

/// Checklist used for the stored-draft completion percentage.
pub const REQUIRED_FIELDS: [&str; 8] = [
    "name",
    "address",
    "phone",
    "business_email",
    "listing_type",
    "kosher_category",
    "short_description",
    "business_hours",
];

/// Schema version assumed for metadata written before versions were stamped.
pub const LEGACY_SCHEMA_VERSION: &str = "1.0.0";

/// The in-progress listing: an open-ended map from field name to JSON value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormSnapshot(Map<String, Value>);

impl FormSnapshot {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Builder-style insert, handy when assembling snapshots inline.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Shallow merge: every top-level field of `partial` replaces ours.
    pub fn merge(&mut self, partial: &FormSnapshot) {
        for (field, value) in partial.iter() {
            self.0.insert(field.clone(), value.clone());
        }
    }

    pub fn merged(mut self, partial: &FormSnapshot) -> Self {
        self.merge(partial);
        self
    }

    /// Returns the trimmed text of a string field, or `None` when the field
    /// is absent, not a string, or blank.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn is_filled(&self, field: &str) -> bool {
        self.get(field).is_some_and(is_filled)
    }

    /// True when at least one identifying field carries non-blank text.
    pub fn has_minimal_data(&self) -> bool {
        IDENTIFYING_FIELDS
            .iter()
            .any(|field| self.text(field).is_some())
    }

    /// Rounded percentage of [`REQUIRED_FIELDS`] that are filled.
    pub fn completion_percentage(&self) -> u8 {
        let filled = REQUIRED_FIELDS
            .iter()
            .filter(|field| self.is_filled(field))
            .count();
        percentage(filled, REQUIRED_FIELDS.len())
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for FormSnapshot {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for FormSnapshot {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

impl FromIterator<(String, Value)> for FormSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Presence check used by the completion checklist: arrays count when
/// non-empty, strings when non-blank, numbers when non-zero, booleans when
/// true, objects always.
pub fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

pub(crate) fn percentage(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((part as f64 / total as f64) * 100.0).round() as u8
}

fn legacy_version() -> String {
    LEGACY_SCHEMA_VERSION.to_string()
}

fn first_step() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormMetadata {
    pub last_saved: DateTime<Utc>,
    #[serde(default = "first_step")]
    pub current_step: u32,
    #[serde(default = "legacy_version")]
    pub version: String,
    #[serde(default)]
    pub save_count: u64,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub data: FormSnapshot,
    pub metadata: FormMetadata,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

impl SaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveStatus::Idle => "idle",
            SaveStatus::Saving => "saving",
            SaveStatus::Saved => "saved",
            SaveStatus::Error => "error",
        }
    }
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backup document produced by `export_form_data` and consumed by
/// `import_form_data`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    #[serde(default)]
    pub form_data: Option<FormSnapshot>,
    #[serde(default)]
    pub metadata: Option<FormMetadata>,
    /// `None` on import means "leave history untouched"; an empty list
    /// still replaces it.
    #[serde(default)]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,
}

/// What the primary snapshot record currently holds.
#[derive(Clone, Debug, PartialEq)]
pub enum DraftState {
    Missing,
    Corrupted { reason: String },
    Present(FormSnapshot),
}

impl DraftState {
    pub fn snapshot(&self) -> Option<&FormSnapshot> {
        match self {
            DraftState::Present(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}
