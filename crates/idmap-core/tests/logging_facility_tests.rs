#![allow(clippy::unwrap_used, clippy::expect_used)]

use idmap_core::errors::{ExError, ExErrorKind, IdmapError};
use idmap_core::SessionId;
use idmap_core::logging_facility::test_capture::init_test_capture;
use idmap_core::{log_op_end, log_op_error, log_op_start};
use idmap_core_types::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_COMPONENT, FIELD_DURATION_MS, FIELD_ENTITY_ID, FIELD_ENTITY_TYPE,
    FIELD_ERR_CODE, FIELD_ERR_KIND,
};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name, entity_type = "Customer");

    let start_events: Vec<_> = capture
        .events_for(op_name)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_START))
        .collect();

    assert_eq!(start_events.len(), 1);
    assert_eq!(start_events[0].field(FIELD_ENTITY_TYPE), Some("Customer"));
    assert!(start_events[0].field(FIELD_COMPONENT).is_some());
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let end_events: Vec<_> = capture
        .events_for(op_name)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END))
        .collect();

    assert_eq!(end_events.len(), 1, "Should have exactly one end event");
    assert_eq!(end_events[0].field(FIELD_DURATION_MS), Some("42"));
}

#[test]
fn test_log_op_error_includes_kind_and_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = IdmapError::NotTracked {
        entity_type: "Customer",
        id: Some(3),
    };
    log_op_error!(op_name, err, duration_ms = 10);

    let error_events: Vec<_> = capture
        .events_for(op_name)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .collect();

    assert_eq!(error_events.len(), 1);
    let event = &error_events[0];
    assert_eq!(event.level, tracing::Level::ERROR);
    assert_eq!(event.field(FIELD_ERR_CODE), Some("ERR_INVALID_STATE"));
    assert_eq!(event.field(FIELD_ERR_KIND), Some("InvalidState"));
    assert!(event.field("err_message").unwrap().contains("not tracked"));
}

#[test]
fn test_log_op_error_accepts_ex_error() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_4";

    let err = ExError::new(ExErrorKind::Concurrency).with_message("row vanished");
    log_op_error!(op_name, err, duration_ms = 1, entity_id = 9);

    capture.assert_event_exists(op_name, EVENT_END_ERROR);
    let event = capture.events_for(op_name).pop().unwrap();
    assert_eq!(event.field(FIELD_ENTITY_ID), Some("9"));
    assert_eq!(event.field("err_message"), Some("row vanished"));
}

#[test]
fn test_log_op_error_carries_session_id_from_error() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_5";
    let session_id = SessionId::new();

    // Given an error raised inside a session
    let err = ExError::new(ExErrorKind::NotFound).with_session_id(session_id.clone());

    // When it is logged at the boundary
    log_op_error!(op_name, err, duration_ms = 2);

    // Then the end_error event can be found by session
    let events = capture.for_session(session_id.as_str());
    assert_eq!(events.len(), 1);
    assert!(events[0].is(op_name, EVENT_END_ERROR));
}
