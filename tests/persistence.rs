mod support;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use listing_draft::clock::ManualClock;
use listing_draft::types::REQUIRED_FIELDS;
use listing_draft::{
    DraftState, ExportBundle, FileStore, FormSnapshot, MemoryStore, PersistenceConfig,
    PersistenceService, SaveStatus,
};
use support::{CountingStore, FailingStore, StaticForm, named, record_statuses};

fn memory_service() -> PersistenceService {
    PersistenceService::new(Arc::new(MemoryStore::new()))
}

#[tokio::test]
async fn stored_snapshot_is_left_fold_of_partials() {
    let service = memory_service();
    service
        .save_form_data(&FormSnapshot::new().with("a", 1), 1, false)
        .await
        .unwrap();
    service
        .save_form_data(&FormSnapshot::new().with("b", 2), 1, false)
        .await
        .unwrap();
    service
        .save_form_data(&FormSnapshot::new().with("a", 3), 1, false)
        .await
        .unwrap();

    let stored = service.load_form_data().await.unwrap();
    assert_eq!(stored.get("a"), Some(&json!(3)));
    assert_eq!(stored.get("b"), Some(&json!(2)));
}

#[tokio::test]
async fn step_jump_keeps_earlier_fields() {
    let service = memory_service();
    service.save_form_data(&named("Foo"), 1, false).await.unwrap();
    service
        .save_form_data(&FormSnapshot::new(), 2, false)
        .await
        .unwrap();

    assert_eq!(service.get_last_saved_step().await, 2);
    let stored = service.load_form_data().await.unwrap();
    assert_eq!(stored.text("name"), Some("Foo"));
}

#[tokio::test]
async fn history_keeps_five_newest_first() {
    let service = memory_service();
    for i in 1..=7 {
        let metadata = service
            .save_form_data(&named(&format!("v{i}")), 1, false)
            .await
            .unwrap();
        assert_eq!(metadata.save_count, i);
    }

    let history = service.get_save_history().await;
    assert_eq!(history.len(), 5);
    let names: Vec<_> = history
        .iter()
        .map(|entry| entry.data.text("name").unwrap().to_string())
        .collect();
    assert_eq!(names, ["v7", "v6", "v5", "v4", "v3"]);
    assert_eq!(history[0].metadata.save_count, 7);
}

#[tokio::test]
async fn clear_removes_everything() {
    let service = memory_service();
    service.save_form_data(&named("Foo"), 2, false).await.unwrap();
    service.clear_form_data().await.unwrap();

    assert!(!service.has_saved_data().await);
    assert_eq!(service.get_form_completion_percentage().await, 0);
    assert!(service.get_metadata().await.is_none());
    assert!(service.get_save_history().await.is_empty());
    assert_eq!(service.get_last_saved_step().await, 1);
    assert_eq!(service.get_save_status(), SaveStatus::Idle);
}

#[tokio::test]
async fn completion_counts_required_fields() {
    let service = memory_service();
    assert_eq!(service.get_form_completion_percentage().await, 0);

    let full: FormSnapshot = REQUIRED_FIELDS
        .iter()
        .map(|field| (field.to_string(), json!("filled")))
        .collect();
    service.save_form_data(&full, 4, true).await.unwrap();
    assert_eq!(service.get_form_completion_percentage().await, 100);

    service
        .save_form_data(&FormSnapshot::new().with("business_hours", json!([])), 4, true)
        .await
        .unwrap();
    assert_eq!(service.get_form_completion_percentage().await, 88);
}

#[tokio::test]
async fn export_import_round_trip() {
    let source = memory_service();
    source.save_form_data(&named("Foo"), 1, false).await.unwrap();
    source
        .save_form_data(&FormSnapshot::new().with("phone", "5551234567"), 3, false)
        .await
        .unwrap();
    let exported = source.export_form_data().await.unwrap();

    let target = memory_service();
    target.import_form_data(&exported).await.unwrap();

    assert_eq!(target.load_form_data().await, source.load_form_data().await);
    assert_eq!(target.get_save_history().await, source.get_save_history().await);
    assert_eq!(target.get_last_saved_step().await, 3);
}

#[tokio::test]
async fn restore_makes_older_entry_current() {
    let service = memory_service();
    service.save_form_data(&named("Old"), 1, false).await.unwrap();
    service.save_form_data(&named("New"), 2, false).await.unwrap();

    let restored = service.restore_from_history(1).await.unwrap().unwrap();
    assert_eq!(restored.text("name"), Some("Old"));
    assert_eq!(service.load_form_data().await.unwrap().text("name"), Some("Old"));
    assert_eq!(service.get_last_saved_step().await, 1);

    assert_eq!(service.restore_from_history(10).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn status_returns_to_idle_after_saved_timeout() {
    let service = memory_service();
    let (log, _subscription) = record_statuses(&service);

    service.save_form_data(&named("Foo"), 1, false).await.unwrap();
    assert_eq!(*log.lock().unwrap(), [SaveStatus::Saving, SaveStatus::Saved]);

    tokio::time::sleep(Duration::from_millis(1900)).await;
    assert_eq!(service.get_save_status(), SaveStatus::Saved);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        *log.lock().unwrap(),
        [SaveStatus::Saving, SaveStatus::Saved, SaveStatus::Idle]
    );
}

#[tokio::test(start_paused = true)]
async fn a_new_save_restarts_the_idle_countdown() {
    let service = memory_service();
    service.save_form_data(&named("A"), 1, false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    service.save_form_data(&named("B"), 1, false).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(service.get_save_status(), SaveStatus::Saved);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(service.get_save_status(), SaveStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn failed_write_reports_error_then_idles() {
    let store = CountingStore::new();
    let service = PersistenceService::new(store.clone());
    let (log, _subscription) = record_statuses(&service);

    store.fail_writes(true);
    assert!(service.save_form_data(&named("Foo"), 1, false).await.is_err());
    assert_eq!(*log.lock().unwrap(), [SaveStatus::Saving, SaveStatus::Error]);

    tokio::time::sleep(Duration::from_millis(2900)).await;
    assert_eq!(service.get_save_status(), SaveStatus::Error);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(service.get_save_status(), SaveStatus::Idle);
}

#[tokio::test]
async fn unreachable_store_degrades_to_defaults() {
    let service = PersistenceService::new(Arc::new(FailingStore));
    assert!(service.load_form_data().await.is_none());
    assert!(service.get_metadata().await.is_none());
    assert!(!service.has_saved_data().await);
    assert!(service.get_save_history().await.is_empty());
    assert_eq!(service.get_form_completion_percentage().await, 0);
    assert!(service.clear_form_data().await.is_err());
    assert!(service.draft_state().await.is_err());
}

#[tokio::test]
async fn dropped_subscription_stops_delivery() {
    let service = memory_service();
    let (log, subscription) = record_statuses(&service);
    subscription.unsubscribe();
    subscription.unsubscribe();
    service.save_form_data(&named("Foo"), 1, false).await.unwrap();
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn interval_skips_forms_without_identifying_data() {
    let store = CountingStore::new();
    let service = PersistenceService::new(store.clone());
    let data_key = service.config().keys.data.clone();
    let form = StaticForm::new(FormSnapshot::new().with("website", "https://deli.com"), 1);

    service.start_auto_save(form.clone());
    tokio::time::sleep(Duration::from_secs(65)).await;
    assert_eq!(store.writes_to(&data_key), 0);

    *form.snapshot.lock().unwrap() = named("Deli");
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(store.writes_to(&data_key), 1);
    service.stop_auto_save();
}

#[tokio::test(start_paused = true)]
async fn interval_waits_a_full_period_and_restarts_do_not_stack() {
    let store = CountingStore::new();
    let service = PersistenceService::new(store.clone());
    let data_key = service.config().keys.data.clone();
    let form = StaticForm::new(named("Deli"), 2);

    service.start_auto_save(form.clone());
    service.start_auto_save(form.clone());
    assert!(service.is_auto_saving());

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(store.writes_to(&data_key), 0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(store.writes_to(&data_key), 1);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(store.writes_to(&data_key), 2);
    assert_eq!(service.get_last_saved_step().await, 2);

    service.stop_auto_save();
    assert!(!service.is_auto_saving());
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(store.writes_to(&data_key), 2);
}

#[tokio::test]
async fn file_store_survives_a_new_service() {
    let dir = tempfile::tempdir().unwrap();
    let config = PersistenceConfig::with_namespace("test_listing");

    let first = PersistenceService::builder(Arc::new(FileStore::new(dir.path())))
        .config(config.clone())
        .build()
        .unwrap();
    first.save_form_data(&named("Deli"), 3, false).await.unwrap();

    let second = PersistenceService::builder(Arc::new(FileStore::new(dir.path())))
        .config(config)
        .build()
        .unwrap();
    assert!(matches!(
        second.draft_state().await.unwrap(),
        DraftState::Present(_)
    ));
    assert_eq!(second.load_form_data().await.unwrap().text("name"), Some("Deli"));
    assert_eq!(second.get_last_saved_step().await, 3);
    assert_eq!(second.get_save_history().await.len(), 1);
}

#[tokio::test]
async fn timestamps_come_from_the_configured_clock() {
    let start: chrono::DateTime<chrono::Utc> = "2024-05-01T12:00:00Z".parse().unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let service = PersistenceService::builder(Arc::new(MemoryStore::new()))
        .clock(clock.clone())
        .build()
        .unwrap();

    let metadata = service.save_form_data(&named("Deli"), 1, false).await.unwrap();
    assert_eq!(metadata.last_saved, start);

    clock.advance(chrono::Duration::minutes(5));
    let bundle: ExportBundle =
        serde_json::from_str(&service.export_form_data().await.unwrap()).unwrap();
    assert_eq!(bundle.exported_at, Some(start + chrono::Duration::minutes(5)));
    assert_eq!(bundle.metadata.unwrap().last_saved, start);
}

#[tokio::test]
async fn history_write_failure_does_not_fail_the_save() {
    let store = CountingStore::new();
    let service = PersistenceService::new(store.clone());
    let keys = service.config().keys.clone();
    store.fail_writes_to(&keys.history);

    let metadata = service.save_form_data(&named("Deli"), 2, false).await.unwrap();
    assert_eq!(metadata.save_count, 1);
    assert_eq!(service.get_save_status(), SaveStatus::Saved);
    assert_eq!(service.load_form_data().await.unwrap().text("name"), Some("Deli"));
    assert_eq!(service.get_last_saved_step().await, 2);
    assert!(service.get_save_history().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_interval_save_is_swallowed_and_the_interval_continues() {
    let store = CountingStore::new();
    let service = PersistenceService::new(store.clone());
    let data_key = service.config().keys.data.clone();
    let form = StaticForm::new(named("Deli"), 1);

    store.fail_writes(true);
    service.start_auto_save(form);
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(store.writes_to(&data_key), 0);
    assert_eq!(service.get_save_status(), SaveStatus::Error);
    assert!(service.is_auto_saving());

    store.fail_writes(false);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(store.writes_to(&data_key), 1);
    assert_eq!(service.get_metadata().await.unwrap().save_count, 1);
    service.stop_auto_save();
}
