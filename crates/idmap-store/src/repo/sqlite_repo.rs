//! SQLite repository implementation
//!
//! Reads and writes entity rows as `PropertyValues`. Table and column names
//! come only from the entity's static descriptor; every value is bound as a
//! parameter.

use std::collections::HashSet;

use crate::errors::{from_rusqlite, Result};
use idmap_core::errors::{ExError, ExErrorKind};
use idmap_core::model::{Entity, FieldValue, Filter, PropertyValues};
use idmap_core::tracking::EntityDescriptor;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// SQLite repository for entity rows
pub struct SqliteRepo;

impl SqliteRepo {
    /// Rows of `E` matching `filter`, ordered by key
    ///
    /// # Errors
    ///
    /// `InvalidInput` for unknown filter columns, `Persistence` on SQLite
    /// failure, `Serialization` for column values of an unsupported type.
    pub fn select<E: Entity>(conn: &Connection, filter: &Filter) -> Result<Vec<PropertyValues>> {
        let descriptor = EntityDescriptor::of::<E>();
        let predicate = filter.to_sql::<E>()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {}",
            select_list(&descriptor),
            descriptor.table,
            predicate.clause,
            descriptor.key_column
        );
        tracing::debug!(sql = %sql, params = predicate.params.len(), "select");

        let names = column_names(&descriptor);
        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let raw_rows = stmt
            .query_map(params_from_iter(predicate.params.iter().map(to_sql_value)), |row| {
                (0..names.len())
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        raw_rows
            .into_iter()
            .map(|raw| {
                names
                    .iter()
                    .zip(raw)
                    .map(|(name, value)| Ok((name.to_string(), from_sql_value(&descriptor, name, value)?)))
                    .collect::<Result<PropertyValues>>()
            })
            .collect()
    }

    /// The row of `E` with key `id`, if it still exists
    ///
    /// # Errors
    ///
    /// As for [`SqliteRepo::select`].
    pub fn select_by_key<E: Entity>(conn: &Connection, id: i64) -> Result<Option<PropertyValues>> {
        Ok(Self::select::<E>(conn, &Filter::key(id))?.into_iter().next())
    }

    /// Number of rows of `E` matching `filter`
    ///
    /// # Errors
    ///
    /// `InvalidInput` for unknown filter columns, `Persistence` on SQLite
    /// failure.
    pub fn count<E: Entity>(conn: &Connection, filter: &Filter) -> Result<u64> {
        let predicate = filter.to_sql::<E>()?;
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", E::TABLE, predicate.clause);
        tracing::debug!(sql = %sql, "count");

        let count: i64 = conn
            .query_row(
                &sql,
                params_from_iter(predicate.params.iter().map(to_sql_value)),
                |row| row.get(0),
            )
            .map_err(from_rusqlite)?;
        Ok(count.max(0) as u64)
    }

    /// Which of `ids` still have a row of `E`
    ///
    /// # Errors
    ///
    /// `Persistence` on SQLite failure.
    pub fn existing_keys<E: Entity>(conn: &Connection, ids: &[i64]) -> Result<HashSet<i64>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {key} FROM {table} WHERE {key} IN ({placeholders})",
            key = E::KEY_COLUMN,
            table = E::TABLE,
        );
        tracing::debug!(sql = %sql, candidates = ids.len(), "existing keys");

        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let found = stmt
            .query_map(params_from_iter(ids.iter()), |row| row.get::<_, i64>(0))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<HashSet<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(found)
    }

    /// Insert a row, letting the store assign the key
    ///
    /// Returns the new key.
    ///
    /// # Errors
    ///
    /// `Persistence` on SQLite failure, including CHECK constraint violations.
    pub fn insert(
        conn: &Connection,
        descriptor: &EntityDescriptor,
        values: &PropertyValues,
    ) -> Result<i64> {
        let placeholders = vec!["?"; descriptor.columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            descriptor.table,
            descriptor.columns.join(", "),
            placeholders
        );
        conn.execute(&sql, params_from_iter(data_params(descriptor, values)))
            .map_err(from_rusqlite)?;

        let id = conn.last_insert_rowid();
        tracing::debug!(table = descriptor.table, id, "row inserted");
        Ok(id)
    }

    /// Overwrite the data columns of the row with key `key`
    ///
    /// Returns the number of rows affected (0 if the row is gone).
    ///
    /// # Errors
    ///
    /// `Persistence` on SQLite failure.
    pub fn update(
        conn: &Connection,
        descriptor: &EntityDescriptor,
        key: i64,
        values: &PropertyValues,
    ) -> Result<usize> {
        let assignments = descriptor
            .columns
            .iter()
            .map(|column| format!("{} = ?", column))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            descriptor.table, assignments, descriptor.key_column
        );

        let mut params = data_params(descriptor, values);
        params.push(Value::Integer(key));
        let affected = conn
            .execute(&sql, params_from_iter(params))
            .map_err(from_rusqlite)?;
        tracing::debug!(table = descriptor.table, id = key, affected, "row updated");
        Ok(affected)
    }

    /// Delete the row with key `key`
    ///
    /// Returns the number of rows affected (0 if the row is already gone).
    ///
    /// # Errors
    ///
    /// `Persistence` on SQLite failure.
    pub fn delete(conn: &Connection, descriptor: &EntityDescriptor, key: i64) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            descriptor.table, descriptor.key_column
        );
        let affected = conn.execute(&sql, [key]).map_err(from_rusqlite)?;
        tracing::debug!(table = descriptor.table, id = key, affected, "row deleted");
        Ok(affected)
    }
}

/// Bind form of a column value
pub fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Integer(i) => Value::Integer(*i),
        FieldValue::Text(s) => Value::Text(s.clone()),
    }
}

/// Column value read back from SQLite
///
/// # Errors
///
/// `Serialization` for REAL and BLOB values, which no entity column holds.
pub fn from_sql_value(descriptor: &EntityDescriptor, column: &str, value: Value) -> Result<FieldValue> {
    match value {
        Value::Null => Ok(FieldValue::Null),
        Value::Integer(i) => Ok(FieldValue::Integer(i)),
        Value::Text(s) => Ok(FieldValue::Text(s)),
        Value::Real(_) | Value::Blob(_) => Err(ExError::new(ExErrorKind::Serialization)
            .with_op("read_row")
            .with_entity_type(descriptor.entity_type)
            .with_message(format!("column '{}' holds an unsupported value type", column))),
    }
}

fn column_names(descriptor: &EntityDescriptor) -> Vec<&'static str> {
    std::iter::once(descriptor.key_column)
        .chain(descriptor.columns.iter().copied())
        .collect()
}

fn select_list(descriptor: &EntityDescriptor) -> String {
    column_names(descriptor).join(", ")
}

fn data_params(descriptor: &EntityDescriptor, values: &PropertyValues) -> Vec<Value> {
    descriptor
        .columns
        .iter()
        .map(|column| values.get(column).map(to_sql_value).unwrap_or(Value::Null))
        .collect()
}
