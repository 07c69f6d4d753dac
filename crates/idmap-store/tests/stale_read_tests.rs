// A session's default reads keep returning cached instances even after
// another session changes the underlying rows.

mod common;

use common::{first_by_key, name_in_store, rename_elsewhere, setup_db};
use idmap_core::model::{Customer, Filter};
use idmap_core::tracking::EntityState;
use idmap_store::fixtures::{add_customer, delete_customer};

#[test]
fn test_cached_entity_hides_external_update() {
    let (_tmp, db) = setup_db();
    let sue_id = add_customer(&db, "Sue", Some("VA")).unwrap();

    // Given Sue is cached by session 1
    let mut session = db.session().unwrap();
    let sue = first_by_key(&mut session, sue_id);
    assert_eq!(sue.borrow().name, "Sue");

    // When another user renames her
    rename_elsewhere(&db, sue_id, "Susan");
    assert_eq!(name_in_store(&db, sue_id).as_deref(), Some("Susan"));

    // Then session 1 still returns the cached instance with the old name
    let again = first_by_key(&mut session, sue_id);
    assert!(again.ptr_eq(&sue));
    assert_eq!(again.borrow().name, "Sue");
    assert_eq!(session.state(&again), EntityState::Unchanged);
}

#[test]
fn test_default_query_omits_rows_deleted_elsewhere() {
    let (_tmp, db) = setup_db();
    let sue_id = add_customer(&db, "Sue", Some("VA")).unwrap();

    let mut session = db.session().unwrap();
    let sue = first_by_key(&mut session, sue_id);

    delete_customer(&db, sue_id).unwrap();

    // The store decides membership, so the query comes back empty
    let found = session
        .query::<Customer>()
        .filter(Filter::key(sue_id))
        .first_or_default()
        .unwrap();
    assert!(found.is_none());

    // The old handle keeps its values and is still tracked
    assert_eq!(sue.borrow().name, "Sue");
    assert_eq!(session.state(&sue), EntityState::Unchanged);
}

#[test]
fn test_default_query_sees_rows_added_elsewhere() {
    let (_tmp, db) = setup_db();
    let sue_id = add_customer(&db, "Sue", Some("VA")).unwrap();

    let mut session = db.session().unwrap();
    let virginians = session
        .query::<Customer>()
        .filter(Filter::eq("state", "VA"))
        .to_list()
        .unwrap();
    assert_eq!(virginians.len(), 1);

    let jim_id = add_customer(&db, "Jim", Some("VA")).unwrap();

    let virginians = session
        .query::<Customer>()
        .filter(Filter::eq("state", "VA"))
        .to_list()
        .unwrap();
    let ids: Vec<_> = virginians.iter().filter_map(|c| c.key()).collect();
    assert_eq!(ids, vec![sue_id, jim_id]);
}

#[test]
fn test_find_is_served_from_cache() {
    let (_tmp, db) = setup_db();
    let sue_id = add_customer(&db, "Sue", None).unwrap();

    let mut session = db.session().unwrap();
    let sue = session.find::<Customer>(sue_id).unwrap().unwrap();

    // Even a deleted row is found while cached
    delete_customer(&db, sue_id).unwrap();
    let cached = session.find::<Customer>(sue_id).unwrap().unwrap();
    assert!(cached.ptr_eq(&sue));

    // A fresh session does not find it
    let mut fresh = db.session().unwrap();
    assert!(fresh.find::<Customer>(sue_id).unwrap().is_none());
}

#[test]
fn test_find_missing_row_returns_none() {
    let (_tmp, db) = setup_db();
    let mut session = db.session().unwrap();
    assert!(session.find::<Customer>(999).unwrap().is_none());
    assert_eq!(session.tracked_count(), 0);
}
