use hospital_core::{
    Doctor, DocumentStore, PageQuery, Patient, Session, SessionError, SessionState, StoreConfig,
};

fn memory_store() -> DocumentStore {
    DocumentStore::open(StoreConfig::in_memory()).unwrap()
}

#[test]
fn operations_before_open_fail_fast() {
    let store = memory_store();
    let mut session = Session::new(&store);
    assert_eq!(session.state(), SessionState::Unopened);

    let err = session.query::<Patient>(&PageQuery::first()).unwrap_err();
    assert!(matches!(err, SessionError::NotOpen(SessionState::Unopened)));
    let err = session.store(&mut Patient::new("Ada", "Lovelace")).unwrap_err();
    assert!(matches!(err, SessionError::NotOpen(SessionState::Unopened)));
    assert!(matches!(
        session.save_changes(),
        Err(SessionError::NotOpen(SessionState::Unopened))
    ));
}

#[test]
fn open_twice_is_the_same_session() {
    let store = memory_store();
    let mut session = Session::new(&store);
    let id = session.id();
    session.open().unwrap();
    session.open().unwrap();
    assert!(session.is_open());
    assert_eq!(session.id(), id);
}

#[test]
fn close_discards_pending_work_and_is_terminal() {
    let store = memory_store();
    let mut session = Session::new(&store);
    session.open().unwrap();
    session.store(&mut Doctor::new("Yang")).unwrap();
    assert!(session.has_changes());

    session.close();
    session.close();
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!session.has_changes());
    assert!(matches!(
        session.open(),
        Err(SessionError::NotOpen(SessionState::Closed))
    ));
    assert!(matches!(
        session.load::<Doctor>("doctors/1"),
        Err(SessionError::NotOpen(SessionState::Closed))
    ));

    let mut reader = Session::new(&store);
    reader.open().unwrap();
    assert_eq!(reader.query::<Doctor>(&PageQuery::first()).unwrap().total, 0);
}

#[test]
fn store_assigns_ids_without_touching_the_store() {
    let store = memory_store();
    let mut writer = Session::new(&store);
    writer.open().unwrap();
    let mut doctor = Doctor::new("Karev");
    writer.store(&mut doctor).unwrap();
    let id = doctor.id.clone().unwrap();
    assert!(id.starts_with("doctors/"));

    let mut reader = Session::new(&store);
    reader.open().unwrap();
    assert!(reader.load::<Doctor>(&id).unwrap().is_none());

    assert_eq!(writer.save_changes().unwrap().stored, 1);
    assert_eq!(reader.load::<Doctor>(&id).unwrap(), Some(doctor));
}

#[test]
fn load_of_missing_or_foreign_ids_is_none() {
    let store = memory_store();
    let mut session = Session::new(&store);
    session.open().unwrap();
    let mut doctor = Doctor::new("Torres");
    session.store(&mut doctor).unwrap();
    session.save_changes().unwrap();

    assert!(session.load::<Doctor>("doctors/nope").unwrap().is_none());
    let id = doctor.id.unwrap();
    assert!(session.load::<Patient>(&id).unwrap().is_none());
}

#[test]
fn pending_writes_are_visible_to_load_in_the_same_session() {
    let store = memory_store();
    let mut session = Session::new(&store);
    session.open().unwrap();
    let mut doctor = Doctor::new("Robbins");
    session.store(&mut doctor).unwrap();
    session.save_changes().unwrap();
    let id = doctor.id.clone().unwrap();

    doctor.department = Some("Pediatrics".to_string());
    session.store(&mut doctor).unwrap();
    let pending: Doctor = session.load(&id).unwrap().unwrap();
    assert_eq!(pending.department.as_deref(), Some("Pediatrics"));

    session.delete(&doctor).unwrap();
    assert!(session.load::<Doctor>(&id).unwrap().is_none());
    assert!(matches!(
        session.store(&mut doctor),
        Err(SessionError::DeletedInSession(deleted)) if deleted == id
    ));

    let outcome = session.save_changes().unwrap();
    assert_eq!(outcome.deleted, 1);
    assert_eq!(outcome.stored, 0);
    assert!(session.load::<Doctor>(&id).unwrap().is_none());
}

#[test]
fn deleting_an_unsaved_entity_drops_it() {
    let store = memory_store();
    let mut session = Session::new(&store);
    session.open().unwrap();
    let mut doctor = Doctor::new("Avery");
    session.store(&mut doctor).unwrap();
    session.delete(&doctor).unwrap();

    assert!(!session.has_changes());
    assert!(session.save_changes().unwrap().is_empty());
}

#[test]
fn deleting_an_entity_never_read_is_rejected() {
    let store = memory_store();
    let mut writer = Session::new(&store);
    writer.open().unwrap();
    let mut doctor = Doctor::new("Hunt");
    writer.store(&mut doctor).unwrap();
    writer.save_changes().unwrap();

    let mut other = Session::new(&store);
    other.open().unwrap();
    assert!(matches!(
        other.delete(&doctor),
        Err(SessionError::Untracked(_))
    ));
}

#[test]
fn discard_keeps_the_store_untouched() {
    let store = memory_store();
    let mut session = Session::new(&store);
    session.open().unwrap();
    session.store(&mut Doctor::new("Kepner")).unwrap();
    assert_eq!(session.discard_changes(), 1);
    assert!(session.save_changes().unwrap().is_empty());
    assert_eq!(session.query::<Doctor>(&PageQuery::first()).unwrap().total, 0);
}
