//! Per-session identity map
//!
//! Guarantees at most one tracked in-memory instance per (entity type, key).
//! Added entities have no key yet and are held apart until the store assigns
//! one.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::errors::{IdmapError, Result};
use crate::model::{Entity, FieldValue, Filter, PropertyValues};
use crate::tracking::entry::{EntityRef, Slot, TrackedEntry};
use crate::tracking::state::{EntityState, MergeOption};

/// Identity of a cached row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub entity_type: &'static str,
    pub id: i64,
}

impl EntityKey {
    pub fn of<E: Entity>(id: i64) -> Self {
        Self {
            entity_type: E::ENTITY_TYPE,
            id,
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.id)
    }
}

#[derive(Default)]
pub struct IdentityMap {
    entries: HashMap<EntityKey, Rc<dyn TrackedEntry>>,
    added: Vec<Rc<dyn TrackedEntry>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked entities, pending inserts included
    pub fn len(&self) -> usize {
        self.entries.len() + self.added.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.added.is_empty()
    }

    pub fn contains_key(&self, key: &EntityKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Cached instance for `id`, if any
    pub fn get<E: Entity>(&self, id: i64) -> Option<EntityRef<E>> {
        let entry = self.entries.get(&EntityKey::of::<E>(id))?;
        Rc::clone(entry)
            .as_any()
            .downcast::<Slot<E>>()
            .ok()
            .map(EntityRef::from_slot)
    }

    /// Whether this exact instance is tracked here
    pub fn contains<E: Entity>(&self, handle: &EntityRef<E>) -> bool {
        self.locate(handle).is_some()
    }

    /// Reconcile one store row with the cache according to `merge`
    ///
    /// # Errors
    ///
    /// `MissingField`/`FieldType` if the row does not describe an `E`.
    pub fn resolve<E: Entity>(
        &mut self,
        row: &PropertyValues,
        merge: MergeOption,
    ) -> Result<EntityRef<E>> {
        if merge == MergeOption::NoTracking {
            return Ok(EntityRef::detached(E::from_values(row)?));
        }

        let id = row_key::<E>(row)?;
        if let Some(cached) = self.get::<E>(id) {
            match merge {
                MergeOption::AppendOnly | MergeOption::NoTracking => {}
                MergeOption::OverwriteChanges => cached.slot.overwrite(row)?,
                MergeOption::PreserveChanges => cached.slot.preserve(row)?,
            }
            return Ok(cached);
        }

        let slot = Rc::new(Slot::new(E::from_values(row)?, EntityState::Unchanged));
        slot.accept_original(row);
        tracing::debug!(key = %EntityKey::of::<E>(id), "cache miss, materialised");
        self.entries.insert(EntityKey::of::<E>(id), slot.clone());
        Ok(EntityRef::from_slot(slot))
    }

    /// Start tracking a new entity for insertion
    pub fn track_added<E: Entity>(&mut self, entity: E) -> EntityRef<E> {
        let slot = Rc::new(Slot::new(entity, EntityState::Added));
        self.added.push(slot.clone());
        EntityRef::from_slot(slot)
    }

    /// Mark a tracked entity for deletion; an Added entity is simply dropped
    ///
    /// # Errors
    ///
    /// `NotTracked` if the handle is not tracked here.
    pub fn mark_deleted<E: Entity>(&mut self, handle: &EntityRef<E>) -> Result<()> {
        match self.locate(handle) {
            Some(Location::Added(index)) => {
                self.added.remove(index);
                handle.slot.set_state(EntityState::Detached);
                Ok(())
            }
            Some(Location::Cached(_)) => {
                handle.slot.set_state(EntityState::Deleted);
                Ok(())
            }
            None => Err(not_tracked(handle)),
        }
    }

    /// Stop tracking `handle`, leaving it in `state` (Detached or Orphaned)
    ///
    /// Returns false if the handle was not tracked here.
    pub fn evict<E: Entity>(&mut self, handle: &EntityRef<E>, state: EntityState) -> bool {
        let found = match self.locate(handle) {
            Some(Location::Added(index)) => {
                self.added.remove(index);
                true
            }
            Some(Location::Cached(key)) => {
                self.entries.remove(&key);
                true
            }
            None => false,
        };
        if found {
            tracing::debug!(state = %state, "evicted from identity map");
            handle.slot.set_state(state);
        }
        found
    }

    /// Store-wins update of a tracked entity
    ///
    /// # Errors
    ///
    /// `NotTracked`, or materialisation errors from `row`.
    pub fn overwrite<E: Entity>(&mut self, handle: &EntityRef<E>, row: &PropertyValues) -> Result<()> {
        self.require_cached(handle)?;
        handle.slot.overwrite(row)
    }

    /// Client-wins update of a tracked entity
    ///
    /// # Errors
    ///
    /// `NotTracked` if the handle is not a cached entry of this map.
    pub fn accept_original<E: Entity>(
        &mut self,
        handle: &EntityRef<E>,
        row: &PropertyValues,
    ) -> Result<()> {
        self.require_cached(handle)?;
        handle.slot.accept_original(row);
        Ok(())
    }

    /// Keys of cached `E` whose last-known store values match `filter` but
    /// that are not in `returned`
    ///
    /// Such a row was either deleted or edited out of the filter by someone
    /// else; only the store can tell which.
    pub fn unreturned_keys<E: Entity>(&self, filter: &Filter, returned: &HashSet<i64>) -> Vec<i64> {
        let mut keys: Vec<i64> = self
            .entries
            .iter()
            .filter(|(key, entry)| {
                key.entity_type == E::ENTITY_TYPE
                    && !returned.contains(&key.id)
                    && filter.matches::<E>(&entry.original_values())
            })
            .map(|(key, _)| key.id)
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Evict the cached `E` entries for `ids`, whose rows are gone, marking
    /// each Orphaned
    pub fn orphan<E: Entity>(&mut self, ids: &[i64]) -> usize {
        let mut orphaned = 0;
        for id in ids {
            let key = EntityKey::of::<E>(*id);
            if let Some(entry) = self.entries.remove(&key) {
                entry.set_state(EntityState::Orphaned);
                tracing::debug!(key = %key, "row gone from store, orphaned");
                orphaned += 1;
            }
        }
        orphaned
    }

    /// Tracked handles of `E` whose state is one of `states`, ordered by key
    /// with pending inserts last
    pub fn entries_of<E: Entity>(&self, states: &[EntityState]) -> Vec<EntityRef<E>> {
        let mut keys: Vec<&EntityKey> = self
            .entries
            .keys()
            .filter(|key| key.entity_type == E::ENTITY_TYPE)
            .collect();
        keys.sort();

        let cached = keys.into_iter().filter_map(|key| self.entries.get(key));
        cached
            .chain(self.added.iter())
            .filter(|entry| states.contains(&entry.state()))
            .filter_map(|entry| Rc::clone(entry).as_any().downcast::<Slot<E>>().ok())
            .map(EntityRef::from_slot)
            .collect()
    }

    /// Entries with work for `save_changes`: inserts first, then cached
    /// entries in key order
    pub fn pending(&self) -> Vec<Rc<dyn TrackedEntry>> {
        let mut cached: Vec<(&EntityKey, &Rc<dyn TrackedEntry>)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.state().is_pending())
            .collect();
        cached.sort_by_key(|(key, _)| **key);

        self.added
            .iter()
            .cloned()
            .chain(cached.into_iter().map(|(_, entry)| Rc::clone(entry)))
            .collect()
    }

    /// Move a saved insert into the keyed cache
    ///
    /// # Errors
    ///
    /// `DuplicateKey` if another instance is already cached under `id`.
    pub fn promote_added(&mut self, entry: &Rc<dyn TrackedEntry>, id: i64) -> Result<()> {
        let descriptor = entry.descriptor();
        let key = EntityKey {
            entity_type: descriptor.entity_type,
            id,
        };
        if self.entries.contains_key(&key) {
            return Err(IdmapError::DuplicateKey {
                entity_type: descriptor.entity_type,
                id,
            });
        }
        self.added.retain(|e| e.addr() != entry.addr());
        entry.accept_saved(id);
        self.entries.insert(key, Rc::clone(entry));
        Ok(())
    }

    /// Drop a deleted entry after its row was removed
    pub fn complete_delete(&mut self, entry: &Rc<dyn TrackedEntry>) {
        if let Some(id) = entry.key() {
            let key = EntityKey {
                entity_type: entry.descriptor().entity_type,
                id,
            };
            self.entries.remove(&key);
        }
        entry.set_state(EntityState::Detached);
    }

    /// Detach everything
    pub fn clear(&mut self) {
        for entry in self.entries.values().chain(self.added.iter()) {
            entry.set_state(EntityState::Detached);
        }
        self.entries.clear();
        self.added.clear();
    }

    fn locate<E: Entity>(&self, handle: &EntityRef<E>) -> Option<Location> {
        let addr = handle.addr();
        if let Some(index) = self.added.iter().position(|e| e.addr() == addr) {
            return Some(Location::Added(index));
        }
        let key = EntityKey::of::<E>(handle.entry().key()?);
        match self.entries.get(&key) {
            Some(entry) if entry.addr() == addr => Some(Location::Cached(key)),
            _ => None,
        }
    }

    fn require_cached<E: Entity>(&self, handle: &EntityRef<E>) -> Result<()> {
        match self.locate(handle) {
            Some(Location::Cached(_)) => Ok(()),
            Some(Location::Added(_)) => Err(IdmapError::InvalidState {
                entity_type: E::ENTITY_TYPE,
                id: None,
                op: "refresh",
                state: EntityState::Added.to_string(),
            }),
            None => Err(not_tracked(handle)),
        }
    }
}

enum Location {
    Added(usize),
    Cached(EntityKey),
}

fn not_tracked<E: Entity>(handle: &EntityRef<E>) -> IdmapError {
    IdmapError::NotTracked {
        entity_type: E::ENTITY_TYPE,
        id: handle.key(),
    }
}

fn row_key<E: Entity>(row: &PropertyValues) -> Result<i64> {
    match row.get(E::KEY_COLUMN) {
        Some(FieldValue::Integer(id)) => Ok(*id),
        Some(other) => Err(IdmapError::FieldType {
            entity_type: E::ENTITY_TYPE,
            field: E::KEY_COLUMN.to_string(),
            expected: "integer",
            found: other.kind_name().to_string(),
        }),
        None => Err(IdmapError::MissingField {
            entity_type: E::ENTITY_TYPE,
            field: E::KEY_COLUMN.to_string(),
        }),
    }
}
