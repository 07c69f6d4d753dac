use std::collections::HashMap;

use rusqlite::{params, Connection};

use super::{Migration, MIGRATIONS};
use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};

const CREATE_SCHEMA_VERSION: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY,
    migration_id TEXT NOT NULL UNIQUE,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL
)";

/// Row of the `schema_version` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub migration_id: String,
    pub applied_at: i64,
    pub checksum: String,
}

/// Bring the schema up to date
///
/// Every recorded checksum is verified before anything new is applied.
///
/// # Errors
///
/// `Persistence` if a migration fails to execute or a recorded checksum no
/// longer matches the embedded SQL.
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(CREATE_SCHEMA_VERSION)
        .map_err(from_rusqlite)?;

    let recorded: HashMap<String, String> = applied_migrations(conn)?
        .into_iter()
        .map(|m| (m.migration_id, m.checksum))
        .collect();

    for migration in MIGRATIONS {
        let checksum = migration.checksum();
        match recorded.get(migration.id) {
            Some(seen) if *seen != checksum => {
                return Err(checksum_mismatch(migration.id, seen, &checksum));
            }
            Some(_) => {}
            None => apply_one(conn, migration, &checksum)?,
        }
    }
    Ok(())
}

/// Applied migrations, oldest first
///
/// # Errors
///
/// `Persistence` on SQLite failure, including a missing `schema_version`.
pub fn applied_migrations(conn: &Connection) -> Result<Vec<AppliedMigration>> {
    let mut stmt = conn
        .prepare("SELECT migration_id, applied_at, checksum FROM schema_version ORDER BY id")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(AppliedMigration {
                migration_id: row.get(0)?,
                applied_at: row.get(1)?,
                checksum: row.get(2)?,
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

fn apply_one(conn: &mut Connection, migration: &Migration, checksum: &str) -> Result<()> {
    let tx = conn.transaction().map_err(from_rusqlite)?;
    tx.execute_batch(migration.sql)
        .map_err(|e| migration_error(migration.id, &e.to_string()))?;
    tx.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?1, ?2, ?3)",
        params![migration.id, chrono::Utc::now().timestamp(), checksum],
    )
    .map_err(from_rusqlite)?;
    tx.commit().map_err(from_rusqlite)?;

    tracing::debug!(migration_id = migration.id, "migration applied");
    Ok(())
}
