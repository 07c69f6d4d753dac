//! Query predicates
//!
//! A `Filter` has two renderings that must agree: a parameterised SQL `WHERE`
//! clause for the store, and an in-memory evaluation against last-known
//! values, used to find cached entries a store query should have returned.

use crate::errors::{IdmapError, Result};
use crate::model::entity::Entity;
use crate::model::values::{FieldValue, PropertyValues};

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every row
    All,
    /// Primary key equality
    Key(i64),
    /// Column equality; `Null` matches NULL columns
    Eq(String, FieldValue),
    /// Conjunction; empty means every row
    And(Vec<Filter>),
}

/// Rendered `WHERE` clause with positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPredicate {
    pub clause: String,
    pub params: Vec<FieldValue>,
}

impl Filter {
    pub fn key(id: i64) -> Self {
        Filter::Key(id)
    }

    pub fn eq(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    /// Conjoin with another filter, flattening nested conjunctions
    pub fn and(self, other: Filter) -> Self {
        let mut parts = match self {
            Filter::And(parts) => parts,
            Filter::All => Vec::new(),
            single => vec![single],
        };
        match other {
            Filter::And(more) => parts.extend(more),
            Filter::All => {}
            single => parts.push(single),
        }
        Filter::And(parts)
    }

    /// The key this filter pins, if it is a plain key lookup
    pub fn single_key(&self) -> Option<i64> {
        match self {
            Filter::Key(id) => Some(*id),
            Filter::And(parts) if parts.len() == 1 => parts[0].single_key(),
            _ => None,
        }
    }

    /// Reject columns the entity does not have, and values the column
    /// cannot hold
    ///
    /// SQLite would coerce a mistyped value (`'5'` equals `5` in a TEXT
    /// column) while [`Filter::matches`] compares strictly, so such filters
    /// are refused rather than evaluated two ways.
    ///
    /// # Errors
    ///
    /// `UnknownColumn` or `FilterValueType` for the first offending term.
    pub fn validate<E: Entity>(&self) -> Result<()> {
        match self {
            Filter::All | Filter::Key(_) => Ok(()),
            Filter::Eq(column, value) => match E::kind_of(column) {
                None => Err(IdmapError::UnknownColumn {
                    entity_type: E::ENTITY_TYPE,
                    column: column.clone(),
                }),
                Some(kind) if !kind.admits(value) => Err(IdmapError::FilterValueType {
                    entity_type: E::ENTITY_TYPE,
                    column: column.clone(),
                    expected: kind.name(),
                    found: value.kind_name(),
                }),
                Some(_) => Ok(()),
            },
            Filter::And(parts) => parts.iter().try_for_each(|p| p.validate::<E>()),
        }
    }

    /// Render as a SQL predicate for `E`'s table
    ///
    /// # Errors
    ///
    /// As for [`Filter::validate`].
    pub fn to_sql<E: Entity>(&self) -> Result<SqlPredicate> {
        self.validate::<E>()?;
        let mut params = Vec::new();
        let clause = self.render::<E>(&mut params);
        Ok(SqlPredicate { clause, params })
    }

    fn render<E: Entity>(&self, params: &mut Vec<FieldValue>) -> String {
        match self {
            Filter::All => "1 = 1".to_string(),
            Filter::Key(id) => {
                params.push(FieldValue::Integer(*id));
                format!("{} = ?", E::KEY_COLUMN)
            }
            Filter::Eq(column, FieldValue::Null) => format!("{} IS NULL", column),
            Filter::Eq(column, value) => {
                params.push(value.clone());
                format!("{} = ?", column)
            }
            Filter::And(parts) if parts.is_empty() => "1 = 1".to_string(),
            Filter::And(parts) => parts
                .iter()
                .map(|p| format!("({})", p.render::<E>(params)))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }

    /// Evaluate against a value snapshot of `E`
    ///
    /// Absent columns read as NULL.
    pub fn matches<E: Entity>(&self, values: &PropertyValues) -> bool {
        match self {
            Filter::All => true,
            Filter::Key(id) => values.get(E::KEY_COLUMN) == Some(&FieldValue::Integer(*id)),
            Filter::Eq(column, expected) => {
                let actual = values.get(column).unwrap_or(&FieldValue::Null);
                actual == expected
            }
            Filter::And(parts) => parts.iter().all(|p| p.matches::<E>(values)),
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}
