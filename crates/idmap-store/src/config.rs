//! Store configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file, then `IDMAP_*` environment variables.

use std::path::{Path, PathBuf};

use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::errors::{config_error, Result};

pub const DEFAULT_DATABASE_PATH: &str = "idmap.db";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_JOURNAL_MODE: &str = "wal";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    pub database_path: PathBuf,
    pub busy_timeout_ms: u64,
    pub journal_mode: String,
}

impl StoreConfig {
    /// Defaults for a database at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: path.into(),
            ..Self::default()
        }
    }

    /// Load from defaults, `file` (if given and present) and the environment
    ///
    /// # Errors
    ///
    /// `Config` if a source cannot be parsed or a value has the wrong type.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("database_path", DEFAULT_DATABASE_PATH)
            .and_then(|b| b.set_default("busy_timeout_ms", DEFAULT_BUSY_TIMEOUT_MS as i64))
            .and_then(|b| b.set_default("journal_mode", DEFAULT_JOURNAL_MODE))
            .map_err(config_error)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let config = builder
            .add_source(Environment::with_prefix("IDMAP").try_parsing(true))
            .build()
            .map_err(config_error)?;

        let loaded: StoreConfig = config.try_deserialize().map_err(config_error)?;
        tracing::debug!(
            database_path = %loaded.database_path.display(),
            journal_mode = %loaded.journal_mode,
            "store config loaded"
        );
        Ok(loaded)
    }

    pub fn with_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    pub fn with_journal_mode(mut self, mode: impl Into<String>) -> Self {
        self.journal_mode = mode.into();
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: DEFAULT_JOURNAL_MODE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_new_keeps_defaults() {
        let config = StoreConfig::new("/tmp/x.db");
        assert_eq!(config.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert_eq!(config.journal_mode, "wal");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "database_path = \"from_file.db\"").unwrap();
        writeln!(file, "busy_timeout_ms = 250").unwrap();

        let config = StoreConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("from_file.db"));
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.journal_mode, "wal");
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "busy_timeout_ms = \"soon\"").unwrap();

        let err = StoreConfig::load(Some(file.path())).unwrap_err();
        assert_eq!(err.code(), "ERR_CONFIG");
    }
}
