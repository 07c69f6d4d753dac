//! Customer helpers acting as a second, independent user
//!
//! Each call opens its own short-lived session, so its writes are committed
//! behind the back of any session the caller already holds.

use idmap_core::errors::{ExError, ExErrorKind};
use idmap_core::model::Customer;

use crate::db::Database;
use crate::errors::{not_found, Result};

/// Insert a customer and return its store-assigned key
///
/// # Errors
///
/// `Validation` for an empty or overlong name or state, `Persistence` on
/// SQLite failure.
pub fn add_customer(db: &Database, name: &str, state: Option<&str>) -> Result<i64> {
    let mut session = db.session()?;
    let customer = session.add(Customer::new(name, state));
    session.save_changes()?;

    let id = customer.key().ok_or_else(|| {
        ExError::new(ExErrorKind::Internal)
            .with_op("add_customer")
            .with_message("insert assigned no key")
    })?;
    tracing::debug!(id, name, "customer added");
    Ok(id)
}

/// Delete the customer with key `id`
///
/// # Errors
///
/// `NotFound` if the row is already gone, `Persistence` on SQLite failure.
pub fn delete_customer(db: &Database, id: i64) -> Result<()> {
    let mut session = db.session()?;
    let customer = session
        .find::<Customer>(id)?
        .ok_or_else(|| not_found("delete_customer", "Customer", id))?;
    session.remove(&customer)?;
    session.save_changes()?;
    tracing::debug!(id, "customer deleted");
    Ok(())
}

/// Overwrite the name of the customer with key `id`
///
/// # Errors
///
/// `NotFound` if the row is gone, `Validation` for an invalid name.
pub fn rename_customer(db: &Database, id: i64, name: &str) -> Result<()> {
    let mut session = db.session()?;
    let customer = session
        .find::<Customer>(id)?
        .ok_or_else(|| not_found("rename_customer", "Customer", id))?;
    customer.borrow_mut().name = name.to_string();
    session.save_changes()?;
    Ok(())
}
