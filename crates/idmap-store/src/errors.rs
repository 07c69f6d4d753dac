//! Store-side constructors for `ExError`

use idmap_core::errors::{ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// The database recorded a different checksum than the embedded SQL has now
pub fn checksum_mismatch(migration_id: &str, recorded: &str, embedded: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: database has {}, binary has {}",
            migration_id, recorded, embedded
        ))
}

pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

pub fn config_error(err: ::config::ConfigError) -> ExError {
    ExError::new(ExErrorKind::Config)
        .with_op("load_config")
        .with_message(err.to_string())
}

pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Row lookup by key came back empty
pub fn not_found(op: &str, entity_type: &str, id: i64) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_op(op.to_string())
        .with_entity_type(entity_type)
        .with_entity_id(id)
        .with_message("no row with this key")
}

/// Optimistic concurrency failure: the row changed or vanished under us
pub fn concurrency(op: &str, entity_type: &str, id: i64) -> ExError {
    ExError::new(ExErrorKind::Concurrency)
        .with_op(op.to_string())
        .with_entity_type(entity_type)
        .with_entity_id(id)
        .with_message("expected to affect 1 row but affected 0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rusqlite_errors_are_persistence() {
        let err = from_rusqlite(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.kind(), ExErrorKind::Persistence);
        assert_eq!(err.op(), Some("sqlite"));
    }

    #[test]
    fn test_concurrency_carries_entity_context() {
        let err = concurrency("save_changes", "Customer", 4);
        assert_eq!(err.code(), "ERR_CONCURRENCY");
        assert_eq!(err.entity_id(), Some(4));
        assert_eq!(err.entity_type(), Some("Customer"));
    }
}
