//! Boundary logging macros
//!
//! Every session operation brackets its work with `start` and either `end` or
//! `end_error`. Extra `key = value` fields are passed through to `tracing`.

/// Log the start of an operation
///
/// ```
/// # use idmap_core::log_op_start;
/// log_op_start!("reload");
/// log_op_start!("reload", entity_type = "Customer", entity_id = 42);
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_START,
            $($($field)*)?
        );
    };
}

/// Log the successful end of an operation; `duration_ms` is mandatory
///
/// ```
/// # use idmap_core::log_op_end;
/// log_op_end!("save_changes", duration_ms = 3);
/// log_op_end!("query", duration_ms = 1, rows = 2);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_END,
            duration_ms = $duration,
            $($($field)*)?
        );
    };
}

/// Log a failed operation
///
/// Accepts anything convertible into `ExError`. The error's kind, stable
/// code and message are always emitted, and so is its session id when the
/// error carries one.
///
/// ```
/// # use idmap_core::log_op_error;
/// # use idmap_core::errors::{ExError, ExErrorKind};
/// let err = ExError::new(ExErrorKind::Concurrency);
/// log_op_error!("save_changes", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            err_message = ex_err.message(),
            session_id = ex_err.session_id().map($crate::SessionId::as_str),
            $($($field)*)?
        );
    }};
}
