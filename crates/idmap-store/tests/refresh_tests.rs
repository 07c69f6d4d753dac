// Reload and refresh bring cached entities back in line with the store.

mod common;

use common::{first_by_key, rename_elsewhere, setup_db};
use idmap_core::errors::ExErrorKind;
use idmap_core::model::Customer;
use idmap_core::tracking::{EntityRef, EntityState, RefreshMode};
use idmap_store::fixtures::{add_customer, delete_customer};

#[test]
fn test_reload_updates_entity_in_cache() {
    let (_tmp, db) = setup_db();
    let sue_id = add_customer(&db, "Sue", Some("VA")).unwrap();

    let mut session = db.session().unwrap();
    let sue = first_by_key(&mut session, sue_id);

    rename_elsewhere(&db, sue_id, "Susan");
    assert_eq!(first_by_key(&mut session, sue_id).borrow().name, "Sue");

    session.reload(&sue).unwrap();

    assert_eq!(sue.borrow().name, "Susan");
    assert_eq!(sue.state(), EntityState::Unchanged);
    let cached = first_by_key(&mut session, sue_id);
    assert!(cached.ptr_eq(&sue));
    assert_eq!(cached.borrow().name, "Susan");
}

#[test]
fn test_reload_discards_local_edits() {
    let (_tmp, db) = setup_db();
    let sue_id = add_customer(&db, "Sue", Some("VA")).unwrap();

    let mut session = db.session().unwrap();
    let sue = first_by_key(&mut session, sue_id);
    sue.borrow_mut().name = "Suzy".to_string();

    session.reload(&sue).unwrap();
    assert_eq!(sue.borrow().name, "Sue");
    assert!(!session.has_changes());
}

#[test]
fn test_reload_of_deleted_row_orphans_entity() {
    let (_tmp, db) = setup_db();
    let sue_id = add_customer(&db, "Sue", Some("VA")).unwrap();

    let mut session = db.session().unwrap();
    let sue = first_by_key(&mut session, sue_id);
    delete_customer(&db, sue_id).unwrap();

    session.reload(&sue).unwrap();

    assert_eq!(sue.state(), EntityState::Orphaned);
    assert_eq!(sue.borrow().name, "Sue");
    assert!(session.find::<Customer>(sue_id).unwrap().is_none());
}

#[test]
fn test_reload_rejects_untracked_and_added_entities() {
    let (_tmp, db) = setup_db();
    let mut session = db.session().unwrap();

    let stranger = EntityRef::detached(Customer::new("Ann", None));
    let err = session.reload(&stranger).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidState);

    let added = session.add(Customer::new("Jim", None));
    let err = session.reload(&added).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidState);
    assert_eq!(err.session_id(), Some(session.id()));
}

#[test]
fn test_refresh_store_wins_updates_multiple_entities() {
    let (_tmp, db) = setup_db();
    let sue_id = add_customer(&db, "Sue", Some("VA")).unwrap();
    let jim_id = add_customer(&db, "Jim", Some("VA")).unwrap();

    let mut session = db.session().unwrap();
    let sue = first_by_key(&mut session, sue_id);
    let jim = first_by_key(&mut session, jim_id);

    rename_elsewhere(&db, sue_id, "Susan");
    rename_elsewhere(&db, jim_id, "James");

    session
        .refresh(RefreshMode::StoreWins, &[sue.clone(), jim.clone()])
        .unwrap();

    assert_eq!(sue.borrow().name, "Susan");
    assert_eq!(jim.borrow().name, "James");
    assert_eq!(first_by_key(&mut session, jim_id).borrow().name, "James");
}

#[test]
fn test_refresh_only_touches_targeted_entities() {
    let (_tmp, db) = setup_db();
    let sue_id = add_customer(&db, "Sue", Some("VA")).unwrap();
    let jim_id = add_customer(&db, "Jim", Some("VA")).unwrap();

    let mut session = db.session().unwrap();
    let sue = first_by_key(&mut session, sue_id);
    let jim = first_by_key(&mut session, jim_id);

    rename_elsewhere(&db, sue_id, "Susan");
    rename_elsewhere(&db, jim_id, "James");

    session.refresh(RefreshMode::StoreWins, &[sue.clone()]).unwrap();

    assert_eq!(sue.borrow().name, "Susan");
    assert_eq!(jim.borrow().name, "Jim");
}

#[test]
fn test_refresh_client_wins_keeps_local_values() {
    let (_tmp, db) = setup_db();
    let sue_id = add_customer(&db, "Sue", Some("VA")).unwrap();

    let mut session = db.session().unwrap();
    let sue = first_by_key(&mut session, sue_id);

    rename_elsewhere(&db, sue_id, "Susan");
    session.refresh(RefreshMode::ClientWins, &[sue.clone()]).unwrap();

    assert_eq!(sue.borrow().name, "Sue");
    assert_eq!(sue.original_values()["name"], "Susan");
    assert_eq!(sue.state(), EntityState::Modified);

    // Saving puts the local value back
    session.save_changes().unwrap();
    assert_eq!(common::name_in_store(&db, sue_id).as_deref(), Some("Sue"));
}

#[test]
fn test_refresh_validates_all_handles_first() {
    let (_tmp, db) = setup_db();
    let sue_id = add_customer(&db, "Sue", Some("VA")).unwrap();

    let mut session = db.session().unwrap();
    let sue = first_by_key(&mut session, sue_id);
    rename_elsewhere(&db, sue_id, "Susan");

    let stranger = EntityRef::detached(Customer::new("Ann", None));
    let err = session
        .refresh(RefreshMode::StoreWins, &[sue.clone(), stranger])
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::InvalidState);
    assert_eq!(sue.borrow().name, "Sue");
}

#[test]
fn test_refresh_orphans_deleted_rows_and_updates_the_rest() {
    let (_tmp, db) = setup_db();
    let sue_id = add_customer(&db, "Sue", Some("VA")).unwrap();
    let jim_id = add_customer(&db, "Jim", Some("VA")).unwrap();

    let mut session = db.session().unwrap();
    let sue = first_by_key(&mut session, sue_id);
    let jim = first_by_key(&mut session, jim_id);

    delete_customer(&db, sue_id).unwrap();
    rename_elsewhere(&db, jim_id, "James");

    session
        .refresh(RefreshMode::StoreWins, &[sue.clone(), jim.clone()])
        .unwrap();

    assert_eq!(sue.state(), EntityState::Orphaned);
    assert_eq!(jim.borrow().name, "James");
    assert_eq!(session.tracked_count(), 1);
}
