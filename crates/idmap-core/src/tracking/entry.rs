//! Tracked instances and the handles sessions hand out
//!
//! One `Slot` exists per in-memory instance. Every `EntityRef` for the same
//! row within a session points at the same slot, so an in-place reload is
//! visible through handles obtained earlier.

use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::errors::Result;
use crate::model::{Entity, FieldValue, PropertyValues};
use crate::tracking::state::EntityState;

/// Static table layout of an entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub entity_type: &'static str,
    pub table: &'static str,
    pub key_column: &'static str,
    pub columns: &'static [&'static str],
}

impl EntityDescriptor {
    pub fn of<E: Entity>() -> Self {
        Self {
            entity_type: E::ENTITY_TYPE,
            table: E::TABLE,
            key_column: E::KEY_COLUMN,
            columns: E::COLUMNS,
        }
    }
}

pub(crate) struct Slot<E: Entity> {
    entity: RefCell<E>,
    original: RefCell<PropertyValues>,
    state: Cell<EntityState>,
}

impl<E: Entity> Slot<E> {
    pub(crate) fn new(entity: E, state: EntityState) -> Self {
        let original = entity.to_values();
        Self {
            entity: RefCell::new(entity),
            original: RefCell::new(original),
            state: Cell::new(state),
        }
    }

    /// Stored state, with `Unchanged` upgraded to `Modified` when the current
    /// values drift from the originals. While the entity is mutably borrowed
    /// the stored state is reported as-is.
    fn effective_state(&self) -> EntityState {
        let stored = self.state.get();
        if stored != EntityState::Unchanged {
            return stored;
        }
        match (self.entity.try_borrow(), self.original.try_borrow()) {
            (Ok(entity), Ok(original)) if entity.to_values() != *original => {
                EntityState::Modified
            }
            _ => stored,
        }
    }

    fn original_key(&self) -> Option<i64> {
        self.original
            .borrow()
            .get(E::KEY_COLUMN)
            .and_then(FieldValue::as_i64)
            .filter(|id| *id > 0)
    }
}

/// Type-erased view of a tracked slot, used by the identity map and by the
/// store when writing pending changes
pub trait TrackedEntry {
    fn descriptor(&self) -> EntityDescriptor;

    /// Key the entry is cached under (the last key read from or written to
    /// the store); `None` for Added entries
    fn key(&self) -> Option<i64>;

    /// Key currently held by the in-memory instance
    fn current_key(&self) -> Option<i64>;

    fn state(&self) -> EntityState;

    fn set_state(&self, state: EntityState);

    fn current_values(&self) -> PropertyValues;

    fn original_values(&self) -> PropertyValues;

    /// Replace current and original values with `row`; state becomes Unchanged
    ///
    /// # Errors
    ///
    /// Fails if `row` cannot be materialised as the entity.
    fn overwrite(&self, row: &PropertyValues) -> Result<()>;

    /// Adopt `row` as the original values and refresh only the properties
    /// that were not edited locally
    ///
    /// # Errors
    ///
    /// Fails if the merged values cannot be materialised as the entity.
    fn preserve(&self, row: &PropertyValues) -> Result<()>;

    /// Adopt `row` as the original values, keeping current values untouched
    fn accept_original(&self, row: &PropertyValues);

    /// Record a successful write under `key`; state becomes Unchanged
    fn accept_saved(&self, key: i64);

    /// # Errors
    ///
    /// `Validation` from the entity's own rules.
    fn validate(&self) -> Result<()>;

    /// Identity of the underlying instance
    fn addr(&self) -> *const ();

    fn as_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<E: Entity> TrackedEntry for Slot<E> {
    fn descriptor(&self) -> EntityDescriptor {
        EntityDescriptor::of::<E>()
    }

    fn key(&self) -> Option<i64> {
        match self.state.get() {
            EntityState::Added => None,
            _ => self.original_key(),
        }
    }

    fn current_key(&self) -> Option<i64> {
        self.entity.borrow().key()
    }

    fn state(&self) -> EntityState {
        self.effective_state()
    }

    fn set_state(&self, state: EntityState) {
        self.state.set(state);
    }

    fn current_values(&self) -> PropertyValues {
        self.entity.borrow().to_values()
    }

    fn original_values(&self) -> PropertyValues {
        self.original.borrow().clone()
    }

    fn overwrite(&self, row: &PropertyValues) -> Result<()> {
        let fresh = E::from_values(row)?;
        *self.entity.borrow_mut() = fresh;
        *self.original.borrow_mut() = row.clone();
        self.state.set(EntityState::Unchanged);
        Ok(())
    }

    fn preserve(&self, row: &PropertyValues) -> Result<()> {
        if self.state.get() == EntityState::Deleted {
            self.accept_original(row);
            return Ok(());
        }

        let current = self.current_values();
        let original = self.original_values();
        let mut merged = PropertyValues::new();
        for (name, store_value) in row.iter() {
            let edited = current.get(name) != original.get(name);
            let value = if edited {
                current.get(name).cloned().unwrap_or(FieldValue::Null)
            } else {
                store_value.clone()
            };
            merged.set(name, value);
        }

        let fresh = E::from_values(&merged)?;
        *self.entity.borrow_mut() = fresh;
        *self.original.borrow_mut() = row.clone();
        Ok(())
    }

    fn accept_original(&self, row: &PropertyValues) {
        *self.original.borrow_mut() = row.clone();
    }

    fn accept_saved(&self, key: i64) {
        let values = {
            let mut entity = self.entity.borrow_mut();
            entity.set_key(key);
            entity.to_values()
        };
        *self.original.borrow_mut() = values;
        self.state.set(EntityState::Unchanged);
    }

    fn validate(&self) -> Result<()> {
        self.entity.borrow().validate()
    }

    fn addr(&self) -> *const () {
        self as *const Self as *const ()
    }

    fn as_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Handle to one in-memory entity instance
///
/// Cloning the handle does not clone the entity. A handle stays usable after
/// its entity is detached or orphaned; it simply stops being tracked.
pub struct EntityRef<E: Entity> {
    pub(crate) slot: Rc<Slot<E>>,
}

impl<E: Entity> EntityRef<E> {
    pub(crate) fn from_slot(slot: Rc<Slot<E>>) -> Self {
        Self { slot }
    }

    /// Handle that no session tracks, as returned by no-tracking queries
    pub fn detached(entity: E) -> Self {
        Self::from_slot(Rc::new(Slot::new(entity, EntityState::Detached)))
    }

    /// # Panics
    ///
    /// Panics if the entity is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, E> {
        self.slot.entity.borrow()
    }

    /// Edit the entity in place; tracked Unchanged entities report Modified
    /// once their values differ from the originals
    ///
    /// # Panics
    ///
    /// Panics if the entity is already borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, E> {
        self.slot.entity.borrow_mut()
    }

    /// Owned copy of the current values
    pub fn get(&self) -> E {
        self.slot.entity.borrow().clone()
    }

    pub fn state(&self) -> EntityState {
        self.slot.effective_state()
    }

    pub fn key(&self) -> Option<i64> {
        self.slot.entity.borrow().key()
    }

    /// Key of the row this instance was last read from or written to;
    /// `None` while it is only Added
    pub fn stored_key(&self) -> Option<i64> {
        TrackedEntry::key(&*self.slot)
    }

    pub fn current_values(&self) -> PropertyValues {
        self.slot.current_values()
    }

    /// Values as last read from or written to the store
    pub fn original_values(&self) -> PropertyValues {
        self.slot.original_values()
    }

    /// Whether both handles point at the same in-memory instance
    pub fn ptr_eq(&self, other: &EntityRef<E>) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }

    pub(crate) fn addr(&self) -> *const () {
        Rc::as_ptr(&self.slot) as *const ()
    }

    pub(crate) fn entry(&self) -> Rc<dyn TrackedEntry> {
        self.slot.clone()
    }
}

impl<E: Entity> Clone for EntityRef<E> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<E: Entity> fmt::Debug for EntityRef<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("EntityRef");
        out.field("state", &self.state());
        match self.slot.entity.try_borrow() {
            Ok(entity) => out.field("entity", &*entity),
            Err(_) => out.field("entity", &"<borrowed>"),
        };
        out.finish()
    }
}
