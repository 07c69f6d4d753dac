use serde::{Deserialize, Serialize};
use std::fmt;

/// How a session will reconcile an entity on save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    /// New instance, inserted on the next save
    Added,
    /// Tracked and identical to the last values read from or written to the store
    Unchanged,
    /// Tracked with local edits, updated on the next save
    Modified,
    /// Marked for removal, deleted on the next save
    Deleted,
    /// Not tracked by any session
    Detached,
    /// Was tracked, but its row turned out to be gone; evicted from the cache.
    /// The handle keeps its last-known values.
    Orphaned,
}

impl EntityState {
    /// Whether an entity in this state is held by a session's cache
    pub fn is_tracked(&self) -> bool {
        matches!(
            self,
            EntityState::Added
                | EntityState::Unchanged
                | EntityState::Modified
                | EntityState::Deleted
        )
    }

    /// Whether `save_changes` has work to do for this state
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            EntityState::Added | EntityState::Modified | EntityState::Deleted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityState::Added => "Added",
            EntityState::Unchanged => "Unchanged",
            EntityState::Modified => "Modified",
            EntityState::Deleted => "Deleted",
            EntityState::Detached => "Detached",
            EntityState::Orphaned => "Orphaned",
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How query results are reconciled with entities already in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MergeOption {
    /// Cached instances win; only rows not yet cached are materialised
    #[default]
    AppendOnly,
    /// Store values overwrite cached instances, discarding local edits
    OverwriteChanges,
    /// Store values refresh cached instances, keeping properties edited locally
    PreserveChanges,
    /// Bypass the cache entirely
    NoTracking,
}

/// Which side wins when refreshing tracked entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshMode {
    /// Current and original values are replaced by store values
    StoreWins,
    /// Original values are replaced by store values; local edits are kept
    ClientWins,
}
