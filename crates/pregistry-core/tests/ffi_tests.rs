//! Tests for the exported handle API and form-driven registration.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use pregistry_core::views::RegistrationForm;
use pregistry_core::{
    open_profile, open_profile_in_memory, ChangeListener, FfiRegistrationForm, Profile,
    RegistryFfiError,
};
use proptest::prelude::*;

fn valid_form(first: &str) -> FfiRegistrationForm {
    FfiRegistrationForm {
        first_name: first.to_string(),
        last_name: "Okafor".to_string(),
        dob: "1990-02-14".to_string(),
        gender: "Male".to_string(),
        blood_group: "AB-".to_string(),
        address: "5 Marina Road".to_string(),
        city: "Lagos".to_string(),
        state: "Lagos".to_string(),
        country: "Nigeria".to_string(),
        phone: "+234 555 0199".to_string(),
        email: "chidi@example.ng".to_string(),
        insurance: String::new(),
        policy_number: String::new(),
        medical_history: "Asthma".to_string(),
    }
}

struct CountingListener(Arc<AtomicUsize>);

impl ChangeListener for CountingListener {
    fn on_data_changed(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_register_then_list() {
    let tab = open_profile_in_memory().open_tab();

    let id = tab.register_patient(valid_form("Chidi")).unwrap();
    let patients = tab.list_patients().unwrap();

    assert_eq!(patients.len(), 1);
    assert_eq!(patients[0].id, id);
    assert_eq!(patients[0].dob, "1990-02-14");
    assert_eq!(patients[0].insurance, None);
    assert_eq!(patients[0].medical_history.as_deref(), Some("Asthma"));

    let fetched = tab.get_patient(id).unwrap().unwrap();
    assert_eq!(fetched.first_name, "Chidi");
    assert!(tab.get_patient("missing".to_string()).unwrap().is_none());
}

#[test]
fn test_invalid_form_is_rejected_before_store() {
    let tab = open_profile_in_memory().open_tab();
    let hits = Arc::new(AtomicUsize::new(0));
    let _sub = tab.subscribe(Box::new(CountingListener(Arc::clone(&hits))));

    let mut form = valid_form("Chidi");
    form.email = "not-an-email".to_string();
    form.dob = "2999-01-01".to_string();

    match tab.register_patient(form) {
        Err(RegistryFfiError::InvalidInput(message)) => {
            assert!(message.contains("email"));
            assert!(message.contains("dob"));
        }
        other => panic!("expected InvalidInput, got {:?}", other),
    }
    assert!(tab.list_patients().unwrap().is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_query_json_with_params() {
    let tab = open_profile_in_memory().open_tab();
    let id = tab.register_patient(valid_form("Chidi")).unwrap();

    let params = serde_json::json!([id]).to_string();
    let json = tab
        .execute_query_json(
            "SELECT first_name, policy_number FROM patients WHERE id = ?1".to_string(),
            params,
        )
        .unwrap();
    let rows: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(
        rows,
        serde_json::json!([{"first_name": "Chidi", "policy_number": null}])
    );

    let all = tab
        .execute_query_json("SELECT count(*) AS n FROM patients".to_string(), String::new())
        .unwrap();
    assert_eq!(all, r#"[{"n":1}]"#);
}

#[test]
fn test_query_json_errors() {
    let tab = open_profile_in_memory().open_tab();

    assert!(matches!(
        tab.execute_query_json("SELECT 1".to_string(), "{not json".to_string()),
        Err(RegistryFfiError::SerializationError(_))
    ));
    assert!(matches!(
        tab.execute_query_json("SELECT * FROM nowhere".to_string(), "[]".to_string()),
        Err(RegistryFfiError::DatabaseError(_))
    ));
}

#[test]
fn test_export_csv() {
    let tab = open_profile_in_memory().open_tab();
    tab.register_patient(valid_form("Chidi")).unwrap();

    let csv = tab
        .export_query_csv("SELECT first_name, city FROM patients;".to_string())
        .unwrap();
    assert_eq!(csv, "first_name,city\n\"Chidi\",\"Lagos\"");

    assert!(tab
        .export_query_csv("SELECT * FROM patients WHERE id = 'none'".to_string())
        .unwrap()
        .is_empty());
}

#[test]
fn test_listener_hears_other_tab() {
    let profile = open_profile_in_memory();
    let tab1 = profile.open_tab();
    let tab2 = profile.open_tab();

    let hits = Arc::new(AtomicUsize::new(0));
    let subscription = tab1.subscribe(Box::new(CountingListener(Arc::clone(&hits))));
    // join the channel before the other tab writes
    tab1.list_patients().unwrap();

    tab2.register_patient(valid_form("Remote")).unwrap();
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while hits.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(tab1.list_patients().unwrap()[0].first_name, "Remote");

    subscription.unsubscribe();
    subscription.unsubscribe();
    tab1.register_patient(valid_form("Local")).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_durable_profile_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_string_lossy().into_owned();

    let id = open_profile(path.clone())
        .open_tab()
        .register_patient(valid_form("Durable"))
        .unwrap();

    let reopened = open_profile(path).open_tab();
    assert_eq!(reopened.get_patient(id).unwrap().unwrap().first_name, "Durable");
}

fn word() -> impl Strategy<Value = String> {
    "[A-Za-z]{1,20}( [A-Za-z]{1,20})?"
}

prop_compose! {
    fn arb_form()(
        first_name in word(),
        last_name in word(),
        year in 1900i32..2020,
        month in 1u32..=12,
        day in 1u32..=28,
        gender in prop::sample::select(pregistry_core::views::GENDER_OPTIONS),
        blood_group in prop::sample::select(pregistry_core::views::BLOOD_GROUP_OPTIONS),
        city in word(),
        phone in "[0-9]{7,15}",
        user in "[a-z]{1,10}",
        insurance in prop::option::of(word()),
    ) -> RegistrationForm {
        RegistrationForm {
            first_name,
            last_name,
            dob: format!("{:04}-{:02}-{:02}", year, month, day),
            gender: gender.to_string(),
            blood_group: blood_group.to_string(),
            address: "1 Example Street".to_string(),
            city,
            state: "State".to_string(),
            country: "Country".to_string(),
            phone,
            email: format!("{}@example.org", user),
            insurance: insurance.unwrap_or_default(),
            policy_number: String::new(),
            medical_history: String::new(),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// A valid form stores exactly what validation produced.
    #[test]
    fn prop_valid_forms_round_trip(form in arb_form()) {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let expected = form.validate(today).unwrap();

        let tab = Profile::in_memory().open_tab();
        let id = form.submit(&tab, today).unwrap();
        let stored = tab.get_patient_by_id(&id).unwrap().unwrap();

        prop_assert_eq!(stored.to_new_patient(), expected);
        prop_assert_eq!(tab.get_patients().unwrap().len(), 1);
    }
}
