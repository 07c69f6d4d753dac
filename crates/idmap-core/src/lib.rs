#![allow(clippy::result_large_err)]

//! Identity-mapped entity model and change tracking
//!
//! Storage-agnostic half of the session cache: entities and their column
//! values, query filters, per-entity tracking state and the per-session
//! identity map. The SQLite-backed session lives in `idmap-store`.

pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod tracking;

pub use idmap_core_types::schema;
pub use idmap_core_types::SessionId;

pub use errors::{ExError, ExErrorKind, IdmapError, Result};
pub use model::{Customer, Entity, FieldValue, Filter, PropertyValues};
pub use tracking::{EntityRef, EntityState, IdentityMap, MergeOption, RefreshMode};
