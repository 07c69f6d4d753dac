//! Embedded, checksummed schema migrations
//!
//! Each migration runs once per database, in order, inside its own
//! transaction. `schema_version` records the SHA-256 of the SQL that was
//! applied; if the embedded SQL later differs, opening the database fails.

mod runner;

use sha2::{Digest, Sha256};

pub use runner::{applied_migrations, apply_migrations, AppliedMigration};

pub(crate) struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

impl Migration {
    pub fn checksum(&self) -> String {
        hex::encode(Sha256::digest(self.sql.as_bytes()))
    }
}

pub(crate) const MIGRATIONS: &[Migration] = &[Migration {
    id: "001_customers",
    sql: include_str!("../../migrations/001_customers.sql"),
}];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_ordered_and_unique() {
        let ids: Vec<_> = MIGRATIONS.iter().map(|m| m.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_checksum_tracks_sql() {
        let a = Migration { id: "a", sql: "SELECT 1" };
        let b = Migration { id: "a", sql: "SELECT 2" };
        assert_eq!(a.checksum().len(), 64);
        assert_eq!(a.checksum(), a.checksum());
        assert_ne!(a.checksum(), b.checksum());
    }
}
