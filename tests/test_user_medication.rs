//! User medication (prescription) integration tests

use medtrack::app::{
    medication_create, medication_list, medication_update, user_create,
    user_medication_create, user_medication_delete, user_medication_get,
    user_medication_list_by_user, user_medication_update, MedicationCreateReq,
    MedicationUpdateReq, UserCreateReq, UserMedicationCreateReq, UserMedicationUpdateReq,
};
use medtrack::domain::MAX_FREQUENCY_MINUTES;
use medtrack::infra::{init_test_db, DbPool};

// ──────────────────────── Helper ────────────────────────

fn make_user(pool: &DbPool, first: &str) -> String {
    user_create(
        pool,
        UserCreateReq {
            first_name: first.to_string(),
            last_name: "Doe".to_string(),
            email: None,
        },
    )
    .unwrap()
    .id
}

fn by_name(user_id: &str, name: &str) -> UserMedicationCreateReq {
    UserMedicationCreateReq {
        user_id: user_id.to_string(),
        medication_name: Some(name.to_string()),
        dosage: Some(200),
        unit: Some("mg".to_string()),
        frequency_minutes: Some(24 * 60),
        ..Default::default()
    }
}

// ══════════════════════════════════════════════════════════
//  user_medication_create
// ══════════════════════════════════════════════════════════

#[test]
fn create_by_name_adds_catalog_entry() {
    let pool = init_test_db();
    let user_id = make_user(&pool, "Jane");

    let um = user_medication_create(&pool, by_name(&user_id, "Ibuprofen")).unwrap();
    assert_eq!(um.user_id, user_id);
    assert_eq!(um.medication_name, "Ibuprofen");
    assert_eq!(um.dosage, 200);
    assert_eq!(um.unit, "mg");
    assert_eq!(um.frequency_minutes, 1440);
    assert_eq!(um.start_date.len(), 10);

    let catalog = medication_list(&pool, false).unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].id, um.medication_id);
}

#[test]
fn create_by_existing_name_reuses_catalog_entry() {
    let pool = init_test_db();
    let user_id = make_user(&pool, "Jane");

    let first = user_medication_create(&pool, by_name(&user_id, "Ibuprofen")).unwrap();
    let second = user_medication_create(&pool, by_name(&user_id, "ibuprofen")).unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(first.medication_id, second.medication_id);
    assert_eq!(medication_list(&pool, false).unwrap().len(), 1);
}

#[test]
fn create_for_missing_user_is_not_found() {
    let pool = init_test_db();
    let err = user_medication_create(&pool, by_name("no-such-user", "Ibuprofen")).unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    // Nothing is left behind in the catalog.
    assert!(medication_list(&pool, false).unwrap().is_empty());
}

#[test]
fn create_for_missing_medication_id_is_not_found() {
    let pool = init_test_db();
    let user_id = make_user(&pool, "Jane");
    let err = user_medication_create(
        &pool,
        UserMedicationCreateReq {
            user_id,
            medication_id: Some("missing".to_string()),
            dosage: Some(1),
            unit: Some("tablet".to_string()),
            frequency_minutes: Some(60),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn create_requires_exactly_one_medication_reference() {
    let pool = init_test_db();
    let user_id = make_user(&pool, "Jane");

    let mut neither = by_name(&user_id, "x");
    neither.medication_name = None;
    assert_eq!(
        user_medication_create(&pool, neither).unwrap_err().code(),
        "VALIDATION_ERROR"
    );

    let mut both = by_name(&user_id, "Ibuprofen");
    both.medication_id = Some("abc".to_string());
    assert_eq!(
        user_medication_create(&pool, both).unwrap_err().code(),
        "VALIDATION_ERROR"
    );
}

#[test]
fn create_validates_dosage_frequency_and_date() {
    let pool = init_test_db();
    let user_id = make_user(&pool, "Jane");

    let mut req = by_name(&user_id, "Ibuprofen");
    req.dosage = Some(0);
    assert_eq!(user_medication_create(&pool, req).unwrap_err().code(), "VALIDATION_ERROR");

    let mut req = by_name(&user_id, "Ibuprofen");
    req.frequency_minutes = Some(-5);
    assert_eq!(user_medication_create(&pool, req).unwrap_err().code(), "VALIDATION_ERROR");

    let mut req = by_name(&user_id, "Ibuprofen");
    req.start_date = Some("13/01/2024".to_string());
    assert_eq!(user_medication_create(&pool, req).unwrap_err().code(), "VALIDATION_ERROR");

    let mut req = by_name(&user_id, "Ibuprofen");
    req.unit = Some("  ".to_string());
    assert_eq!(user_medication_create(&pool, req).unwrap_err().code(), "VALIDATION_ERROR");
}

#[test]
fn create_rejects_frequency_beyond_one_year() {
    let pool = init_test_db();
    let user_id = make_user(&pool, "Jane");

    let mut req = by_name(&user_id, "Ibuprofen");
    req.frequency_minutes = Some(1_000_000_000_000);
    assert_eq!(user_medication_create(&pool, req).unwrap_err().code(), "VALIDATION_ERROR");

    let mut req = by_name(&user_id, "Ibuprofen");
    req.frequency_minutes = Some(MAX_FREQUENCY_MINUTES + 1);
    assert_eq!(user_medication_create(&pool, req).unwrap_err().code(), "VALIDATION_ERROR");

    let mut req = by_name(&user_id, "Ibuprofen");
    req.frequency_minutes = Some(MAX_FREQUENCY_MINUTES);
    let um = user_medication_create(&pool, req).unwrap();
    assert_eq!(um.frequency_minutes, MAX_FREQUENCY_MINUTES);

    let err = user_medication_update(
        &pool,
        &um.id,
        UserMedicationUpdateReq {
            frequency_minutes: Some(1_000_000_000_000),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(
        user_medication_get(&pool, &um.id).unwrap().frequency_minutes,
        MAX_FREQUENCY_MINUTES
    );
}

#[test]
fn create_falls_back_to_medication_defaults() {
    let pool = init_test_db();
    let user_id = make_user(&pool, "Jane");
    let med = medication_create(
        &pool,
        MedicationCreateReq {
            name: "Amoxicillin".to_string(),
            default_dosage: Some(500),
            default_unit: Some("mg".to_string()),
            default_frequency_minutes: Some(480),
            is_active: None,
        },
    )
    .unwrap();

    let um = user_medication_create(
        &pool,
        UserMedicationCreateReq {
            user_id,
            medication_id: Some(med.id.clone()),
            start_date: Some("2024-03-01".to_string()),
            instructions: Some("with food".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(um.dosage, 500);
    assert_eq!(um.unit, "mg");
    assert_eq!(um.frequency_minutes, 480);
    assert_eq!(um.start_date, "2024-03-01");
    assert_eq!(um.instructions.as_deref(), Some("with food"));
}

#[test]
fn create_without_dosage_or_default_fails() {
    let pool = init_test_db();
    let user_id = make_user(&pool, "Jane");
    let mut req = by_name(&user_id, "Plain");
    req.dosage = None;
    assert_eq!(user_medication_create(&pool, req).unwrap_err().code(), "VALIDATION_ERROR");
}

#[test]
fn create_for_inactive_medication_fails() {
    let pool = init_test_db();
    let user_id = make_user(&pool, "Jane");
    let med = medication_create(
        &pool,
        MedicationCreateReq {
            name: "Retired".to_string(),
            default_dosage: None,
            default_unit: None,
            default_frequency_minutes: None,
            is_active: Some(false),
        },
    )
    .unwrap();
    assert!(!med.is_active);

    let err = user_medication_create(&pool, by_name(&user_id, "Retired")).unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

// ══════════════════════════════════════════════════════════
//  user_medication_update
// ══════════════════════════════════════════════════════════

#[test]
fn update_dosage_persists_and_is_read_back() {
    let pool = init_test_db();
    let user_id = make_user(&pool, "Jane");
    let um = user_medication_create(&pool, by_name(&user_id, "Ibuprofen")).unwrap();

    let updated = user_medication_update(
        &pool,
        &um.id,
        UserMedicationUpdateReq {
            dosage: Some(400),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(updated.dosage, 400);
    assert_eq!(updated.unit, "mg");
    assert_eq!(updated.frequency_minutes, 1440);

    let fetched = user_medication_get(&pool, &um.id).unwrap();
    assert_eq!(fetched.dosage, 400);
}

#[test]
fn update_invalid_values_rejected() {
    let pool = init_test_db();
    let user_id = make_user(&pool, "Jane");
    let um = user_medication_create(&pool, by_name(&user_id, "Ibuprofen")).unwrap();

    let err = user_medication_update(
        &pool,
        &um.id,
        UserMedicationUpdateReq {
            frequency_minutes: Some(0),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(user_medication_get(&pool, &um.id).unwrap().frequency_minutes, 1440);
}

#[test]
fn update_missing_user_medication_not_found() {
    let pool = init_test_db();
    let err = user_medication_update(&pool, "ghost", UserMedicationUpdateReq::default()).unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

// ══════════════════════════════════════════════════════════
//  user_medication_list_by_user / delete
// ══════════════════════════════════════════════════════════

#[test]
fn list_by_user_returns_only_that_users_rows() {
    let pool = init_test_db();
    let jane = make_user(&pool, "Jane");
    let john = make_user(&pool, "John");

    let a = user_medication_create(&pool, by_name(&jane, "Foo")).unwrap();
    let b = user_medication_create(&pool, by_name(&jane, "Bar")).unwrap();
    user_medication_create(&pool, by_name(&john, "Foo")).unwrap();

    let list = user_medication_list_by_user(&pool, &jane, false).unwrap();
    let mut ids: Vec<&str> = list.iter().map(|um| um.id.as_str()).collect();
    ids.sort();
    let mut expected = vec![a.id.as_str(), b.id.as_str()];
    expected.sort();
    assert_eq!(ids, expected);
    assert!(list.iter().all(|um| um.user_id == jane));
}

#[test]
fn list_by_user_hides_retired_medications_unless_asked() {
    let pool = init_test_db();
    let jane = make_user(&pool, "Jane");
    let um = user_medication_create(&pool, by_name(&jane, "Old")).unwrap();
    user_medication_create(&pool, by_name(&jane, "Current")).unwrap();
    medication_update(
        &pool,
        &um.medication_id,
        MedicationUpdateReq {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .unwrap();

    let active = user_medication_list_by_user(&pool, &jane, false).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].medication_name, "Current");

    let all = user_medication_list_by_user(&pool, &jane, true).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn list_by_missing_user_is_not_found() {
    let pool = init_test_db();
    let err = user_medication_list_by_user(&pool, "ghost", false).unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn delete_user_medication() {
    let pool = init_test_db();
    let jane = make_user(&pool, "Jane");
    let um = user_medication_create(&pool, by_name(&jane, "Foo")).unwrap();

    user_medication_delete(&pool, &um.id).unwrap();
    assert_eq!(user_medication_get(&pool, &um.id).unwrap_err().code(), "NOT_FOUND");
    assert_eq!(user_medication_delete(&pool, &um.id).unwrap_err().code(), "NOT_FOUND");
    // The catalog entry stays.
    assert_eq!(medication_list(&pool, true).unwrap().len(), 1);
}
