//! Structured logging for sessions and the store
//!
//! The binary calls [`init`] once. Session operations (queries, `reload`,
//! `refresh`, `database_values`, `save_changes`) log `start` and then `end`
//! or `end_error` through [`log_op_start!`](crate::log_op_start),
//! [`log_op_end!`](crate::log_op_end) and
//! [`log_op_error!`](crate::log_op_error). The identity map, repository and
//! migrations only emit `tracing::debug!` lines.
//!
//! ```rust
//! use idmap_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
