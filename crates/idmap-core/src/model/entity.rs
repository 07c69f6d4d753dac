use crate::errors::{IdmapError, Result};
use crate::model::values::{ColumnKind, FieldValue, PropertyValues};

/// A row-backed record that a session can track
///
/// Implementors describe their table layout statically; the store builds all
/// SQL from these constants, so column names never come from user input.
pub trait Entity: Clone + std::fmt::Debug + 'static {
    /// Name used in identity-map keys, logs, and errors
    const ENTITY_TYPE: &'static str;
    /// Backing table
    const TABLE: &'static str;
    /// Integer primary key column
    const KEY_COLUMN: &'static str;
    /// Non-key columns in select/insert order
    const COLUMNS: &'static [&'static str];

    /// Store-assigned key, `None` until the entity has been inserted
    fn key(&self) -> Option<i64>;

    fn set_key(&mut self, id: i64);

    /// All columns, key included
    fn to_values(&self) -> PropertyValues;

    /// Rebuild from a full row
    ///
    /// # Errors
    ///
    /// `MissingField` or `FieldType` if the values do not describe a row of
    /// this entity.
    fn from_values(values: &PropertyValues) -> Result<Self>;

    /// Check the entity before it is written
    ///
    /// # Errors
    ///
    /// `Validation` with a human-readable reason.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Storage kind of a data column, `None` if there is no such column
    fn column_kind(column: &str) -> Option<ColumnKind>;

    /// Whether `column` is the key or one of the data columns
    fn has_column(column: &str) -> bool {
        column == Self::KEY_COLUMN || Self::COLUMNS.contains(&column)
    }

    /// Storage kind of any column, key included
    fn kind_of(column: &str) -> Option<ColumnKind> {
        if column == Self::KEY_COLUMN {
            Some(ColumnKind::Integer)
        } else {
            Self::column_kind(column)
        }
    }
}

/// Read a required text column
pub(crate) fn required_text<E: Entity>(values: &PropertyValues, field: &str) -> Result<String> {
    match values.get(field) {
        Some(FieldValue::Text(s)) => Ok(s.clone()),
        Some(other) => Err(type_error::<E>(field, "text", other)),
        None => Err(IdmapError::MissingField {
            entity_type: E::ENTITY_TYPE,
            field: field.to_string(),
        }),
    }
}

/// Read a nullable text column; an absent column reads as NULL
pub(crate) fn optional_text<E: Entity>(
    values: &PropertyValues,
    field: &str,
) -> Result<Option<String>> {
    match values.get(field) {
        Some(FieldValue::Text(s)) => Ok(Some(s.clone())),
        Some(FieldValue::Null) | None => Ok(None),
        Some(other) => Err(type_error::<E>(field, "text or null", other)),
    }
}

/// Read an integer column; NULL or absent reads as `None`
pub(crate) fn optional_integer<E: Entity>(
    values: &PropertyValues,
    field: &str,
) -> Result<Option<i64>> {
    match values.get(field) {
        Some(FieldValue::Integer(i)) => Ok(Some(*i)),
        Some(FieldValue::Null) | None => Ok(None),
        Some(other) => Err(type_error::<E>(field, "integer", other)),
    }
}

fn type_error<E: Entity>(field: &str, expected: &'static str, found: &FieldValue) -> IdmapError {
    IdmapError::FieldType {
        entity_type: E::ENTITY_TYPE,
        field: field.to_string(),
        expected,
        found: found.kind_name().to_string(),
    }
}
