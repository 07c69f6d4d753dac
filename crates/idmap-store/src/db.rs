//! Database handle and connection management
//!
//! A `Database` is a cheap, `Send` handle on one SQLite file. Each session
//! gets its own connection, so independent sessions behave like independent
//! users of the same store.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::config::StoreConfig;
use crate::errors::{from_rusqlite, io_error, Result};
use crate::migrations::apply_migrations;
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct Database {
    config: StoreConfig,
}

impl Database {
    /// Open (creating if needed) the database described by `config` and
    /// bring its schema up to date
    ///
    /// # Errors
    ///
    /// `Io` if the parent directory cannot be created, `Persistence` if the
    /// file cannot be opened or a migration fails.
    pub fn open(config: StoreConfig) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| io_error("create_db_dir", e))?;
            }
        }

        let db = Self { config };
        let mut conn = db.connect()?;
        apply_migrations(&mut conn)?;
        tracing::debug!(path = %db.path().display(), "database ready");
        Ok(db)
    }

    /// Shorthand for `open(StoreConfig::new(path))`
    ///
    /// # Errors
    ///
    /// As for [`Database::open`].
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(StoreConfig::new(path.as_ref()))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.database_path
    }

    /// A new configured connection
    ///
    /// # Errors
    ///
    /// `Persistence` if the file cannot be opened or a pragma is rejected.
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.config.database_path).map_err(from_rusqlite)?;
        configure(&conn, &self.config)?;
        Ok(conn)
    }

    /// A new session with an empty cache
    ///
    /// # Errors
    ///
    /// As for [`Database::connect`].
    pub fn session(&self) -> Result<Session> {
        Ok(Session::new(self.connect()?))
    }
}

/// Apply connection pragmas from `config`
///
/// # Errors
///
/// `Persistence` if SQLite rejects a setting.
pub fn configure(conn: &Connection, config: &StoreConfig) -> Result<()> {
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(from_rusqlite)?;

    conn.pragma_update(None, "foreign_keys", true)
        .map_err(from_rusqlite)?;

    // journal_mode answers with the mode actually in effect
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", &config.journal_mode, |row| row.get(0))
        .map_err(from_rusqlite)?;
    tracing::debug!(journal_mode = %mode, "connection configured");

    Ok(())
}
