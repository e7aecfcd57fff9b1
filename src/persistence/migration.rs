use serde_json::{Value, json};

use crate::config::CURRENT_SCHEMA_VERSION;
use crate::types::FormSnapshot;

/// One additive schema step. `apply` must only add fields that are missing;
/// it never removes or rewrites existing ones.
#[derive(Clone, Copy, Debug)]
pub struct Migration {
    pub from: &'static str,
    pub to: &'static str,
    pub apply: fn(&mut FormSnapshot),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MigrationOutcome {
    UpToDate,
    Migrated { from: String, to: String },
    /// No path from the stored version to the target; data passes through
    /// untouched (typically written by a newer client).
    Unknown { version: String },
}

fn insert_missing(snapshot: &mut FormSnapshot, field: &str, default: Value) {
    if !snapshot.contains(field) {
        snapshot.insert(field, default);
    }
}

fn add_certification_and_images(snapshot: &mut FormSnapshot) {
    insert_missing(snapshot, "custom_certifying_agency", json!(""));
    insert_missing(snapshot, "business_images", json!([]));
}

pub fn default_migrations() -> Vec<Migration> {
    vec![Migration {
        from: "1.0.0",
        to: "1.1.0",
        apply: add_certification_and_images,
    }]
}

#[derive(Clone, Debug)]
pub struct Migrator {
    target: String,
    steps: Vec<Migration>,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new(CURRENT_SCHEMA_VERSION, default_migrations())
    }
}

impl Migrator {
    pub fn new(target: impl Into<String>, steps: Vec<Migration>) -> Self {
        Self {
            target: target.into(),
            steps,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn migrate(&self, version: &str, data: FormSnapshot) -> (FormSnapshot, MigrationOutcome) {
        if version == self.target {
            return (data, MigrationOutcome::UpToDate);
        }

        let mut migrated = data.clone();
        let mut current = version;
        // Each step is used at most once, so a cyclic table cannot spin.
        for _ in 0..self.steps.len() {
            let Some(step) = self.steps.iter().find(|s| s.from == current) else {
                break;
            };
            (step.apply)(&mut migrated);
            current = step.to;
            if current == self.target {
                return (
                    migrated,
                    MigrationOutcome::Migrated {
                        from: version.to_string(),
                        to: self.target.clone(),
                    },
                );
            }
        }

        (
            data,
            MigrationOutcome::Unknown {
                version: version.to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_to_date_passes_through() {
        let data = FormSnapshot::new().with("name", "Deli");
        let (out, outcome) = Migrator::default().migrate(CURRENT_SCHEMA_VERSION, data.clone());
        assert_eq!(outcome, MigrationOutcome::UpToDate);
        assert_eq!(out, data);
    }

    #[test]
    fn legacy_gains_defaults_without_losing_fields() {
        let data = FormSnapshot::new()
            .with("name", "Deli")
            .with("business_images", json!(["a.jpg"]))
            .with("field_from_the_future", true);
        let (out, outcome) = Migrator::default().migrate("1.0.0", data);
        assert_eq!(
            outcome,
            MigrationOutcome::Migrated {
                from: "1.0.0".into(),
                to: "1.1.0".into()
            }
        );
        assert_eq!(out.get("custom_certifying_agency"), Some(&json!("")));
        assert_eq!(out.get("business_images"), Some(&json!(["a.jpg"])));
        assert_eq!(out.get("field_from_the_future"), Some(&json!(true)));
    }

    #[test]
    fn migration_is_idempotent() {
        let migrator = Migrator::default();
        let (once, _) = migrator.migrate("1.0.0", FormSnapshot::new());
        let (twice, _) = migrator.migrate("1.0.0", once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn unknown_version_is_untouched() {
        let data = FormSnapshot::new().with("name", "Deli");
        let (out, outcome) = Migrator::default().migrate("9.0.0", data.clone());
        assert_eq!(
            outcome,
            MigrationOutcome::Unknown {
                version: "9.0.0".into()
            }
        );
        assert_eq!(out, data);
    }

    #[test]
    fn cyclic_table_terminates() {
        fn noop(_: &mut FormSnapshot) {}
        let migrator = Migrator::new(
            "3.0.0",
            vec![
                Migration { from: "1.0.0", to: "2.0.0", apply: noop },
                Migration { from: "2.0.0", to: "1.0.0", apply: noop },
            ],
        );
        let (_, outcome) = migrator.migrate("1.0.0", FormSnapshot::new());
        assert!(matches!(outcome, MigrationOutcome::Unknown { .. }));
    }
}
