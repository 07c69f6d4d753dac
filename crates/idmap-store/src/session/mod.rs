//! Identity-mapped session (unit of work)
//!
//! A `Session` owns one connection and one identity map. Default reads
//! return cached instances; the operations below exist to get around that
//! cache when fresher store values are wanted.
//!
//! ## Logging Ownership
//!
//! Session operations own lifecycle logging:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! Lower layers (repo, migrations, identity map) use only `tracing::debug!()`.

mod query;

pub use query::Query;

use std::collections::HashSet;
use std::rc::Rc;
use std::time::Instant;

use idmap_core::errors::{ExError, IdmapError};
use idmap_core::model::{Entity, Filter, PropertyValues};
use idmap_core::tracking::{
    EntityRef, EntityState, IdentityMap, MergeOption, RefreshMode, TrackedEntry,
};
use idmap_core::{log_op_end, log_op_error, log_op_start};
use idmap_core_types::SessionId;
use rusqlite::Connection;

use crate::errors::{concurrency, from_rusqlite, Result};
use crate::repo::SqliteRepo;

pub struct Session {
    id: SessionId,
    conn: Connection,
    map: IdentityMap,
}

impl Session {
    /// Wrap an already configured connection
    pub fn new(conn: Connection) -> Self {
        let id = SessionId::new();
        tracing::debug!(session_id = %id, "session opened");
        Self {
            id,
            conn,
            map: IdentityMap::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Start a query over `E`
    pub fn query<E: Entity>(&mut self) -> Query<'_, E> {
        Query::new(self)
    }

    /// The entity with key `id`
    ///
    /// Served from the cache when tracked, without touching the store. An
    /// entity marked Deleted in this session reads as absent.
    ///
    /// # Errors
    ///
    /// `Persistence` on SQLite failure, `Serialization` if the row cannot be
    /// materialised.
    pub fn find<E: Entity>(&mut self, id: i64) -> Result<Option<EntityRef<E>>> {
        if let Some(cached) = self.map.get::<E>(id) {
            tracing::debug!(session_id = %self.id, id, "find served from cache");
            return Ok(match cached.state() {
                EntityState::Deleted => None,
                _ => Some(cached),
            });
        }

        match SqliteRepo::select_by_key::<E>(&self.conn, id)? {
            Some(row) => Ok(Some(self.map.resolve::<E>(&row, MergeOption::AppendOnly)?)),
            None => Ok(None),
        }
    }

    /// Track a new entity; it is inserted on the next `save_changes`, which
    /// also assigns its key
    pub fn add<E: Entity>(&mut self, entity: E) -> EntityRef<E> {
        self.map.track_added(entity)
    }

    /// Mark a tracked entity for deletion on the next `save_changes`
    ///
    /// Removing an entity that was only added just stops tracking it.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the handle is not tracked by this session.
    pub fn remove<E: Entity>(&mut self, handle: &EntityRef<E>) -> Result<()> {
        self.map
            .mark_deleted(handle)
            .map_err(|e| self.session_error(e))
    }

    /// Stop tracking one entity without touching the store
    ///
    /// The handle keeps its values and reports Detached; the next default
    /// read of the same row materialises a new instance.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the handle is not tracked by this session.
    pub fn detach<E: Entity>(&mut self, handle: &EntityRef<E>) -> Result<()> {
        if self.map.evict(handle, EntityState::Detached) {
            tracing::debug!(session_id = %self.id, id = ?handle.key(), "detached");
            Ok(())
        } else {
            Err(self.session_error(IdmapError::NotTracked {
                entity_type: E::ENTITY_TYPE,
                id: handle.key(),
            }))
        }
    }

    /// Overwrite a tracked entity in place with its current store values
    ///
    /// Every handle to the instance sees the new values; local edits are
    /// discarded. If the row is gone the entity is evicted and reports
    /// Orphaned, keeping its last-known values.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the handle is not tracked or was only added,
    /// `Persistence` on SQLite failure.
    pub fn reload<E: Entity>(&mut self, handle: &EntityRef<E>) -> Result<()> {
        log_op_start!("reload", session_id = %self.id, entity_type = E::ENTITY_TYPE);
        let start = Instant::now();

        self.refresh_impl(RefreshMode::StoreWins, std::slice::from_ref(handle), "reload")
            .map_err(|e| {
                let e = e.with_session_id(self.id.clone());
                log_op_error!(
                    "reload",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64
                );
                e
            })?;

        log_op_end!(
            "reload",
            duration_ms = start.elapsed().as_millis() as u64,
            state = handle.state().as_str()
        );
        Ok(())
    }

    /// Refresh several tracked entities from the store
    ///
    /// `StoreWins` behaves like [`Session::reload`] for each handle.
    /// `ClientWins` adopts store values as the originals and keeps local
    /// values, so entities differing from the store become Modified. Rows
    /// that are gone orphan their entities either way. Every handle is
    /// checked before any entity is touched.
    ///
    /// # Errors
    ///
    /// `InvalidState` if any handle is not tracked or was only added,
    /// `Persistence` on SQLite failure.
    pub fn refresh<E: Entity>(&mut self, mode: RefreshMode, handles: &[EntityRef<E>]) -> Result<()> {
        log_op_start!(
            "refresh",
            session_id = %self.id,
            entity_type = E::ENTITY_TYPE,
            mode = ?mode,
            count = handles.len()
        );
        let start = Instant::now();

        self.refresh_impl(mode, handles, "refresh").map_err(|e| {
            let e = e.with_session_id(self.id.clone());
            log_op_error!(
                "refresh",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!("refresh", duration_ms = start.elapsed().as_millis() as u64);
        Ok(())
    }

    fn refresh_impl<E: Entity>(
        &mut self,
        mode: RefreshMode,
        handles: &[EntityRef<E>],
        op: &'static str,
    ) -> Result<()> {
        let mut keys = Vec::with_capacity(handles.len());
        for handle in handles {
            keys.push(self.stored_key(handle, op)?);
        }

        for (handle, id) in handles.iter().zip(keys) {
            match SqliteRepo::select_by_key::<E>(&self.conn, id)? {
                Some(row) => match mode {
                    RefreshMode::StoreWins => self.map.overwrite(handle, &row)?,
                    RefreshMode::ClientWins => self.map.accept_original(handle, &row)?,
                },
                None => {
                    self.map.evict(handle, EntityState::Orphaned);
                    tracing::debug!(session_id = %self.id, id, "row gone, orphaned");
                }
            }
        }
        Ok(())
    }

    /// Current store values of an entity's row, or `None` if the row is gone
    ///
    /// Never touches the cache: the entity, its state and its original values
    /// stay as they were. Works for detached handles that carry a key too.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the entity has no key yet, `Persistence` on SQLite
    /// failure.
    pub fn database_values<E: Entity>(&self, handle: &EntityRef<E>) -> Result<Option<PropertyValues>> {
        log_op_start!("database_values", session_id = %self.id, entity_type = E::ENTITY_TYPE);
        let start = Instant::now();

        let result = match handle.stored_key() {
            Some(id) => SqliteRepo::select_by_key::<E>(&self.conn, id),
            None => Err(self.session_error(IdmapError::InvalidState {
                entity_type: E::ENTITY_TYPE,
                id: None,
                op: "database_values",
                state: handle.state().to_string(),
            })),
        };

        let values = result.map_err(|e| {
            let e = e.with_session_id(self.id.clone());
            log_op_error!(
                "database_values",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "database_values",
            duration_ms = start.elapsed().as_millis() as u64,
            found = values.is_some()
        );
        Ok(values)
    }

    /// Tracking state of `handle` as seen by this session
    ///
    /// Handles this session does not track report Detached, unless they were
    /// orphaned.
    pub fn state<E: Entity>(&self, handle: &EntityRef<E>) -> EntityState {
        if self.map.contains(handle) {
            return handle.state();
        }
        match handle.state() {
            EntityState::Orphaned => EntityState::Orphaned,
            _ => EntityState::Detached,
        }
    }

    /// Tracked entities of `E` currently in one of `states`
    pub fn tracked<E: Entity>(&self, states: &[EntityState]) -> Vec<EntityRef<E>> {
        self.map.entries_of::<E>(states)
    }

    /// Number of tracked entities of any type
    pub fn tracked_count(&self) -> usize {
        self.map.len()
    }

    /// Whether `save_changes` would write anything
    pub fn has_changes(&self) -> bool {
        !self.map.pending().is_empty()
    }

    /// Detach every tracked entity
    pub fn clear(&mut self) {
        tracing::debug!(session_id = %self.id, tracked = self.map.len(), "cache cleared");
        self.map.clear();
    }

    /// Write pending inserts, updates and deletes in one transaction
    ///
    /// Returns the number of entities written. On any failure the
    /// transaction is rolled back and no tracking state changes.
    ///
    /// # Errors
    ///
    /// `Validation` if an entity fails its rules, `InvalidState` if a tracked
    /// entity's key was edited, `Concurrency` if an update or delete found
    /// its row gone, `Persistence` on SQLite failure.
    pub fn save_changes(&mut self) -> Result<usize> {
        log_op_start!("save_changes", session_id = %self.id);
        let start = Instant::now();

        let written = self.save_changes_impl().map_err(|e| {
            let e = e.with_session_id(self.id.clone());
            log_op_error!(
                "save_changes",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "save_changes",
            duration_ms = start.elapsed().as_millis() as u64,
            rows = written
        );
        Ok(written)
    }

    fn save_changes_impl(&mut self) -> Result<usize> {
        let pending = self.map.pending();
        if pending.is_empty() {
            return Ok(0);
        }

        for entry in &pending {
            self.check_pending(entry.as_ref())?;
        }

        let mut inserted: Vec<(Rc<dyn TrackedEntry>, i64)> = Vec::new();
        {
            let tx = self.conn.transaction().map_err(from_rusqlite)?;
            for entry in &pending {
                let descriptor = entry.descriptor();
                match (entry.state(), entry.key()) {
                    (EntityState::Added, _) => {
                        let id = SqliteRepo::insert(&tx, &descriptor, &entry.current_values())?;
                        inserted.push((Rc::clone(entry), id));
                    }
                    (EntityState::Modified, Some(id)) => {
                        let affected =
                            SqliteRepo::update(&tx, &descriptor, id, &entry.current_values())?;
                        if affected == 0 {
                            return Err(concurrency("save_changes", descriptor.entity_type, id)
                                .with_session_id(self.id.clone()));
                        }
                    }
                    (EntityState::Deleted, Some(id)) => {
                        if SqliteRepo::delete(&tx, &descriptor, id)? == 0 {
                            return Err(concurrency("save_changes", descriptor.entity_type, id)
                                .with_session_id(self.id.clone()));
                        }
                    }
                    _ => {}
                }
            }
            tx.commit().map_err(from_rusqlite)?;
        }

        for (entry, id) in &inserted {
            self.map.promote_added(entry, *id)?;
        }
        for entry in &pending {
            match (entry.state(), entry.key()) {
                (EntityState::Modified, Some(id)) => entry.accept_saved(id),
                (EntityState::Deleted, _) => self.map.complete_delete(entry),
                _ => {}
            }
        }

        tracing::debug!(
            session_id = %self.id,
            inserted = inserted.len(),
            total = pending.len(),
            "changes saved"
        );
        Ok(pending.len())
    }

    fn check_pending(&self, entry: &dyn TrackedEntry) -> Result<()> {
        let state = entry.state();
        if matches!(state, EntityState::Added | EntityState::Modified) {
            entry.validate().map_err(|e| self.session_error(e))?;
        }
        if matches!(state, EntityState::Modified | EntityState::Deleted)
            && entry.current_key() != entry.key()
        {
            return Err(self.session_error(IdmapError::InvalidState {
                entity_type: entry.descriptor().entity_type,
                id: entry.key(),
                op: "change the key of",
                state: state.to_string(),
            }));
        }
        Ok(())
    }

    pub(crate) fn execute<E: Entity>(
        &mut self,
        filter: &Filter,
        merge: MergeOption,
    ) -> Result<Vec<EntityRef<E>>> {
        let rows = SqliteRepo::select::<E>(&self.conn, filter)?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            results.push(self.map.resolve::<E>(row, merge)?);
        }

        if matches!(
            merge,
            MergeOption::OverwriteChanges | MergeOption::PreserveChanges
        ) {
            let returned: HashSet<i64> = results.iter().filter_map(EntityRef::key).collect();
            let candidates = self.map.unreturned_keys::<E>(filter, &returned);
            let live = SqliteRepo::existing_keys::<E>(&self.conn, &candidates)?;
            let gone: Vec<i64> = candidates
                .into_iter()
                .filter(|id| !live.contains(id))
                .collect();
            self.map.orphan::<E>(&gone);
        }

        Ok(results)
    }

    pub(crate) fn count<E: Entity>(&self, filter: &Filter) -> Result<u64> {
        SqliteRepo::count::<E>(&self.conn, filter)
    }

    /// Key a tracked, already stored entity is cached under
    fn stored_key<E: Entity>(&self, handle: &EntityRef<E>, op: &'static str) -> Result<i64> {
        if !self.map.contains(handle) {
            return Err(self.session_error(IdmapError::NotTracked {
                entity_type: E::ENTITY_TYPE,
                id: handle.key(),
            }));
        }
        handle.stored_key().ok_or_else(|| {
            self.session_error(IdmapError::InvalidState {
                entity_type: E::ENTITY_TYPE,
                id: None,
                op,
                state: handle.state().to_string(),
            })
        })
    }

    fn session_error(&self, err: IdmapError) -> ExError {
        ExError::from(err).with_session_id(self.id.clone())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        tracing::debug!(
            session_id = %self.id,
            tracked = self.map.len(),
            "session closed"
        );
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("tracked", &self.map.len())
            .finish()
    }
}
