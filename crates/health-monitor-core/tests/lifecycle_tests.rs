//! Patient lifecycle integration tests.

use health_monitor_core::db::Database;
use health_monitor_core::lifecycle::{LifecycleError, PatientLifecycle};
use health_monitor_core::models::VisitState;
use proptest::prelude::*;

fn text() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z ,.]{0,40}"
}

#[test]
fn test_full_visit_history() {
    let db = Database::open_in_memory().unwrap();
    let lifecycle = PatientLifecycle::new(&db);

    let record = lifecycle.create_record("Alice", "fever", None).unwrap();
    assert_eq!(record.visit_state(), VisitState::AwaitingDiagnosis);

    lifecycle.apply_diagnosis(&record.id, "Flu", Some("Rest")).unwrap();
    lifecycle.record_new_visit(&record.id, "cough", None).unwrap();
    lifecycle
        .apply_diagnosis(&record.id, "Bronchitis", Some("Inhaler"))
        .unwrap();
    lifecycle.record_new_visit(&record.id, "headache", None).unwrap();

    // Only one previous diagnosis is kept
    let stored = lifecycle.get(&record.id).unwrap();
    assert_eq!(stored.prev_diagnosis, Some("Bronchitis".into()));
    assert_eq!(stored.symptoms, "headache");
    assert_eq!(stored.visit_state(), VisitState::AwaitingDiagnosis);
    assert_eq!(stored.joining_date, record.joining_date);
    assert_eq!(stored.name, "Alice");
}

#[test]
fn test_undiagnosed_visit_keeps_previous() {
    let db = Database::open_in_memory().unwrap();
    let lifecycle = PatientLifecycle::new(&db);

    let record = lifecycle.create_record("Alice", "fever", None).unwrap();
    lifecycle.apply_diagnosis(&record.id, "Flu", None).unwrap();
    lifecycle.record_new_visit(&record.id, "cough", None).unwrap();
    // Second visit never diagnosed
    let third = lifecycle.record_new_visit(&record.id, "rash", None).unwrap();

    assert_eq!(third.prev_diagnosis, Some("Flu".into()));
}

#[test]
fn test_image_reference_carries_over() {
    let db = Database::open_in_memory().unwrap();
    let lifecycle = PatientLifecycle::new(&db);

    let record = lifecycle
        .create_record("Alice", "rash", Some("abc.jpg".into()))
        .unwrap();
    let kept = lifecycle.record_new_visit(&record.id, "itching", None).unwrap();
    assert_eq!(kept.image_reference, Some("abc.jpg".into()));

    let replaced = lifecycle
        .record_new_visit(&record.id, "swelling", Some("def.png".into()))
        .unwrap();
    assert_eq!(replaced.image_reference, Some("def.png".into()));
}

#[test]
fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patients.db");

    let id = {
        let db = Database::open(&path).unwrap();
        let lifecycle = PatientLifecycle::new(&db);
        let record = lifecycle.create_record("Alice", "fever", None).unwrap();
        lifecycle.apply_diagnosis(&record.id, "Flu", Some("Rest")).unwrap();
        record.id
    };

    let db = Database::open(&path).unwrap();
    let lifecycle = PatientLifecycle::new(&db);
    let visited = lifecycle.record_new_visit(&id, "cough", None).unwrap();
    assert_eq!(visited.prev_diagnosis, Some("Flu".into()));
}

#[test]
fn test_unknown_id_never_creates() {
    let db = Database::open_in_memory().unwrap();
    let lifecycle = PatientLifecycle::new(&db);

    let result = lifecycle.record_new_visit("00000000-0000-0000-0000-000000000000", "fever", None);
    assert!(matches!(result, Err(LifecycleError::NotFound(_))));
    assert_eq!(db.count_patients().unwrap(), 0);
}

proptest! {
    #[test]
    fn prop_new_visit_rolls_latest_into_prev(
        symptoms in text(),
        diagnosis in text(),
        next_symptoms in text(),
    ) {
        let db = Database::open_in_memory().unwrap();
        let lifecycle = PatientLifecycle::new(&db);

        let record = lifecycle.create_record("Pat", &symptoms, None).unwrap();
        lifecycle.apply_diagnosis(&record.id, &diagnosis, Some("Rest")).unwrap();
        let visited = lifecycle.record_new_visit(&record.id, &next_symptoms, None).unwrap();

        prop_assert_eq!(visited.prev_diagnosis, Some(diagnosis));
        prop_assert_eq!(visited.symptoms, next_symptoms);
        prop_assert!(visited.latest_diagnosis.is_none());
        prop_assert!(visited.medicine_suggestions.is_none());
        prop_assert_eq!(visited.joining_date, record.joining_date);
    }

    #[test]
    fn prop_apply_diagnosis_idempotent(diagnosis in text(), suggestions in text()) {
        let db = Database::open_in_memory().unwrap();
        let lifecycle = PatientLifecycle::new(&db);
        let record = lifecycle.create_record("Pat", "fever", None).unwrap();

        let once = lifecycle.apply_diagnosis(&record.id, &diagnosis, Some(&suggestions)).unwrap();
        let twice = lifecycle.apply_diagnosis(&record.id, &diagnosis, Some(&suggestions)).unwrap();

        prop_assert_eq!(once.latest_diagnosis, twice.latest_diagnosis);
        prop_assert_eq!(once.medicine_suggestions, twice.medicine_suggestions);
        prop_assert_eq!(once.prev_diagnosis, twice.prev_diagnosis);
    }
}
