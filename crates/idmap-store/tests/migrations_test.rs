// Schema setup through Database::open.

use idmap_store::migrations::applied_migrations;
use idmap_store::Database;
use tempfile::TempDir;

#[test]
fn test_open_applies_customers_migration_once() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("schema.db");

    let db = Database::open_path(&path).unwrap();
    let reopened = Database::open_path(&path).unwrap();

    let conn = reopened.connect().unwrap();
    let applied = applied_migrations(&conn).unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].migration_id, "001_customers");
    assert_eq!(applied[0].checksum.len(), 64);

    let tables: i64 = db
        .connect()
        .unwrap()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'customers'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 1);
}

#[test]
fn test_tampered_migration_fails_open() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("schema.db");
    let db = Database::open_path(&path).unwrap();

    db.connect()
        .unwrap()
        .execute("UPDATE schema_version SET checksum = 'deadbeef'", [])
        .unwrap();

    let err = Database::open_path(&path).unwrap_err();
    assert_eq!(err.code(), "ERR_PERSISTENCE");
    assert!(err.to_string().contains("Checksum mismatch"));
}

#[test]
fn test_store_rejects_overlong_name() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open_path(temp_dir.path().join("schema.db")).unwrap();
    let conn = db.connect().unwrap();

    let result = conn.execute(
        "INSERT INTO customers (name, state) VALUES (?, NULL)",
        [&"x".repeat(256)],
    );
    assert!(result.is_err());
}
