// Shared setup for session integration tests.

#![allow(dead_code)]

use idmap_core::model::{Customer, Filter};
use idmap_store::fixtures::rename_customer;
use idmap_store::{Database, Session};
use tempfile::TempDir;

pub fn setup_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open_path(temp_dir.path().join("test.db")).unwrap();
    (temp_dir, db)
}

/// A second user renames the customer from its own session
pub fn rename_elsewhere(db: &Database, id: i64, name: &str) {
    rename_customer(db, id, name).unwrap();
}

/// Name as seen by a brand new session
pub fn name_in_store(db: &Database, id: i64) -> Option<String> {
    let mut session = db.session().unwrap();
    session
        .query::<Customer>()
        .filter(Filter::key(id))
        .first_or_default()
        .unwrap()
        .map(|c| c.get().name)
}

pub fn first_by_key(session: &mut Session, id: i64) -> idmap_core::EntityRef<Customer> {
    session
        .query::<Customer>()
        .filter(Filter::key(id))
        .first()
        .unwrap()
}
