//! Change tracking: entity states, tracked slots and the identity map

pub mod entry;
pub mod identity_map;
pub mod state;

pub use entry::{EntityDescriptor, EntityRef, TrackedEntry};
pub use identity_map::{EntityKey, IdentityMap};
pub use state::{EntityState, MergeOption, RefreshMode};
