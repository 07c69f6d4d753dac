// Session operations own boundary logging.

mod common;

use common::{first_by_key, setup_db};
use idmap_core::logging_facility::init_test_capture;
use idmap_core::model::Customer;
use idmap_core::schema::{FIELD_DURATION_MS, FIELD_ERR_CODE, FIELD_SESSION_ID};
use idmap_core::tracking::EntityRef;
use idmap_store::fixtures::add_customer;

#[test]
fn test_session_operations_emit_start_and_end() {
    let capture = init_test_capture();
    let (_tmp, db) = setup_db();
    let sue_id = add_customer(&db, "Sue", Some("VA")).unwrap();

    let mut session = db.session().unwrap();
    let sue = first_by_key(&mut session, sue_id);
    session.reload(&sue).unwrap();
    session.database_values(&sue).unwrap();

    for op in ["query", "reload", "database_values", "save_changes"] {
        capture.assert_event_exists(op, "start");
        capture.assert_event_exists(op, "end");
    }

    let session_id = session.id().to_string();
    let reload_starts = capture
        .for_session(&session_id)
        .into_iter()
        .filter(|e| e.is("reload", "start"))
        .count();
    assert_eq!(reload_starts, 1);

    let reload_end = capture
        .events_for("reload")
        .into_iter()
        .find(|e| e.event.as_deref() == Some("end") && e.field("state") == Some("Unchanged"))
        .expect("reload end event");
    assert!(reload_end.field(FIELD_DURATION_MS).is_some());
}

#[test]
fn test_failed_operation_emits_end_error_with_code() {
    let capture = init_test_capture();
    let (_tmp, db) = setup_db();
    let mut session = db.session().unwrap();

    let stranger = EntityRef::detached(Customer::new("Ann", None));
    assert!(session.reload(&stranger).is_err());

    let session_id = session.id().to_string();
    let errors = capture.count_events(|e| {
        e.op.as_deref() == Some("reload")
            && e.event.as_deref() == Some("end_error")
            && e.field(FIELD_ERR_CODE) == Some("ERR_INVALID_STATE")
            && e.field(FIELD_SESSION_ID) == Some(session_id.as_str())
    });
    assert_eq!(errors, 1);
}
