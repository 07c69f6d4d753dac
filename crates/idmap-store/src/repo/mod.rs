//! Repository layer: row-level SQL for any `Entity`

mod sqlite_repo;

pub use sqlite_repo::{from_sql_value, to_sql_value, SqliteRepo};
