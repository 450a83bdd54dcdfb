use hospital_core::{
    Condition, ConditionService, Configuration, Doctor, DoctorService, DocumentStore,
    Patient, PatientService, PatientWithPicture, Session, SessionError, StoreConfig,
    VisitService,
};

fn store_with_configuration() -> DocumentStore {
    let store = DocumentStore::open(StoreConfig::in_memory()).unwrap();
    let mut session = Session::new(&store);
    session.open().unwrap();
    let mut configuration = Configuration {
        regions: vec!["North".to_string(), "South".to_string()],
        departments: vec!["Cardiology".to_string()],
        locations: vec!["Ward A".to_string(), "Ward B".to_string()],
        ..Configuration::default()
    };
    session.store(&mut configuration).unwrap();
    session.save_changes().unwrap();
    store
}

#[test]
fn lookups_come_from_the_configuration_document() {
    let store = store_with_configuration();

    let mut patients = PatientService::new(&store);
    patients.attach().unwrap();
    assert_eq!(patients.regions().unwrap(), vec!["North", "South"]);

    let mut doctors = DoctorService::new(&store);
    doctors.attach().unwrap();
    assert_eq!(doctors.departments().unwrap(), vec!["Cardiology"]);

    let mut visits = VisitService::new(&store);
    visits.attach().unwrap();
    assert_eq!(visits.locations().unwrap(), vec!["Ward A", "Ward B"]);
}

#[test]
fn visit_form_pickers_list_doctors_and_conditions_by_name() {
    let store = store_with_configuration();
    let mut doctors = DoctorService::new(&store);
    doctors.attach().unwrap();
    doctors.save(&mut Doctor::new("Zed")).unwrap();
    doctors.save(&mut Doctor::new("Amy")).unwrap();

    let mut conditions = ConditionService::new(&store);
    conditions.attach().unwrap();
    conditions.save(&mut Condition::new("Measles")).unwrap();

    let mut visits = VisitService::new(&store);
    visits.attach().unwrap();
    let names = visits
        .doctors()
        .unwrap()
        .into_iter()
        .map(|doctor| doctor.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Amy", "Zed"]);
    assert_eq!(visits.conditions().unwrap().len(), 1);
}

#[test]
fn services_fail_fast_when_detached() {
    let store = store_with_configuration();
    let mut patients = PatientService::new(&store);
    assert!(matches!(
        patients.list(0, 10, false),
        Err(SessionError::NotOpen(_))
    ));

    patients.attach().unwrap();
    assert!(patients.list(0, 10, false).is_ok());
    patients.detach();
    assert!(matches!(
        patients.regions(),
        Err(SessionError::NotOpen(_))
    ));

    patients.attach().unwrap();
    assert_eq!(patients.regions().unwrap().len(), 2);
}

#[test]
fn concurrent_patient_edits_surface_a_conflict_notice() {
    let store = store_with_configuration();
    let mut first = PatientService::new(&store);
    let mut second = PatientService::new(&store);
    first.attach().unwrap();
    second.attach().unwrap();

    let mut row = PatientWithPicture::new(Patient::new("Alan", "Turing"));
    first.create(&mut row).unwrap();
    let id = row.entity.id.clone().unwrap();

    let mut theirs = second.get(&id).unwrap();
    theirs.entity.email = Some("alan@example.org".to_string());
    second.update(&mut theirs).unwrap();

    row.entity.email = Some("turing@example.org".to_string());
    let err = first.update(&mut row).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(err.to_string(), format!("this record was changed by someone else ({id})"));

    // After the notice the view reloads and retries.
    let mut reloaded = first.get(&id).unwrap();
    assert_eq!(reloaded.entity.email.as_deref(), Some("alan@example.org"));
    reloaded.entity.email = Some("turing@example.org".to_string());
    first.update(&mut reloaded).unwrap();
}
