//! Entity model: the `Entity` trait, the `Customer` row, column values,
//! and query filters.

pub mod customer;
pub mod entity;
pub mod filter;
pub mod values;

pub use customer::{Customer, MAX_TEXT_LEN};
pub use entity::Entity;
pub use filter::{Filter, SqlPredicate};
pub use values::{ColumnKind, FieldValue, PropertyValues};
