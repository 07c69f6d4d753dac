#![allow(clippy::result_large_err)]

//! idmap Store - SQLite-backed sessions over the identity-mapped model
//!
//! Provides:
//! - Layered store configuration
//! - Connection management and embedded, checksummed migrations
//! - Row repository for any `Entity`
//! - `Session` (unit of work with an identity map) and `Query`
//! - Customer fixtures that act as an independent writer

pub mod config;
pub mod db;
pub mod errors;
pub mod fixtures;
pub mod migrations;
pub mod repo;
pub mod session;

// Re-export key types
pub use config::StoreConfig;
pub use db::Database;
pub use errors::Result;
pub use session::{Query, Session};
