use serde_json::json;
use std::sync::Arc;

use listing_draft::validation::{BusinessHours, DayHours, validate_business_hours};
use listing_draft::{
    FormSnapshot, MemoryStore, PersistenceService, ValidationEngine, ValidationTrigger,
};

fn step_one() -> FormSnapshot {
    FormSnapshot::new()
        .with("name", "Kosher Deli")
        .with("address", "123 Main Street, Springfield")
        .with("phone", "555-123-4567")
        .with("business_email", "owner@deli.com")
        .with("listing_type", "Eatery")
}

#[tokio::test]
async fn stored_draft_validates_step_by_step() {
    let service = PersistenceService::new(Arc::new(MemoryStore::new()));
    service.save_form_data(&step_one(), 1, false).await.unwrap();
    service
        .save_form_data(
            &FormSnapshot::new()
                .with("kosher_category", "Dairy")
                .with("custom_certifying_agency", "Local Vaad"),
            2,
            false,
        )
        .await
        .unwrap();

    let draft = service.load_form_data().await.unwrap();
    let engine = ValidationEngine::default();
    let form = engine.validate_form(&draft);

    assert!(form.step_results[&1].is_valid);
    assert!(form.step_results[&2].is_valid);
    assert!(!form.step_results[&3].is_valid);
    assert!(form.step_results[&4].is_valid);
    assert!(!form.is_valid);

    let summary = engine.get_validation_summary(&draft);
    assert_eq!(summary.completed_steps, 3);
    assert_eq!(summary.total_steps, 4);
    assert_eq!(summary.next_required_field.as_deref(), Some("short_description"));
    assert!(!summary.ready_to_submit);
}

#[test]
fn hours_editor_and_form_rule_agree_on_inverted_hours() {
    let engine = ValidationEngine::default();
    let result = engine.validate_field(
        "business_hours",
        Some(&json!([{"day": "Sunday", "openTime": "22:00", "closeTime": "06:00"}])),
        &FormSnapshot::new(),
        ValidationTrigger::OnChange,
    );
    assert_eq!(
        result.error.as_deref(),
        Some("Sunday: Closing time must be after opening time")
    );

    let hours = BusinessHours::from([(
        "Sunday".to_string(),
        DayHours::open("Sunday", "22:00", "06:00"),
    )]);
    assert!(!validate_business_hours(&hours).is_valid);
    let overnight = BusinessHours::from([(
        "Sunday".to_string(),
        DayHours::open("Sunday", "22:00", "06:00").next_day(),
    )]);
    let report = validate_business_hours(&overnight);
    assert!(report.is_valid);
    assert!(report.warnings["Sunday"].starts_with("Very late closing time"));
}
