//! Column values and detached property snapshots

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single column value as stored in the backing table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Kind name used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Integer(_) => "integer",
            FieldValue::Text(_) => "text",
        }
    }
}

/// Storage kind of a column; every column also admits NULL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
}

impl ColumnKind {
    pub fn admits(&self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (_, FieldValue::Null)
                | (ColumnKind::Integer, FieldValue::Integer(_))
                | (ColumnKind::Text, FieldValue::Text(_))
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Text => "text",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(i64::from(v))
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

impl PartialEq<&str> for FieldValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

/// Name-to-value snapshot of one entity's columns
///
/// Detached from any session: mutating a `PropertyValues` never touches the
/// cache or the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyValues(BTreeMap<String, FieldValue>);

impl PropertyValues {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names of properties whose values differ from `other`
    pub fn changed_from(&self, other: &PropertyValues) -> Vec<String> {
        self.0
            .iter()
            .filter(|(name, value)| other.get(name) != Some(*value))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl std::ops::Index<&str> for PropertyValues {
    type Output = FieldValue;

    /// # Panics
    ///
    /// Panics if the property does not exist, like `BTreeMap` indexing.
    fn index(&self, name: &str) -> &FieldValue {
        match self.0.get(name) {
            Some(value) => value,
            None => panic!("no property named '{}'", name),
        }
    }
}

impl FromIterator<(String, FieldValue)> for PropertyValues {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for PropertyValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_and_str_comparison() {
        let values = PropertyValues::new()
            .with("id", 3)
            .with("name", "Susan")
            .with("state", None::<String>);

        assert_eq!(values["name"], "Susan");
        assert_eq!(values["id"].as_i64(), Some(3));
        assert!(values["state"].is_null());
    }

    #[test]
    #[should_panic(expected = "no property named 'missing'")]
    fn test_index_missing_panics() {
        let values = PropertyValues::new();
        let _ = &values["missing"];
    }

    #[test]
    fn test_changed_from_lists_differences() {
        let before = PropertyValues::new().with("name", "Sue").with("state", "VA");
        let after = PropertyValues::new().with("name", "Susan").with("state", "VA");

        assert_eq!(after.changed_from(&before), vec!["name".to_string()]);
        assert!(before.changed_from(&before).is_empty());
    }

    #[test]
    fn test_json_shape_is_flat() {
        let values = PropertyValues::new()
            .with("id", 1)
            .with("name", "Jim")
            .with("state", None::<String>);
        let json = serde_json::to_value(&values).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 1, "name": "Jim", "state": null})
        );
    }

    #[test]
    fn test_display_is_sorted_by_name() {
        let values = PropertyValues::new().with("name", "Jim").with("id", 2);
        assert_eq!(values.to_string(), "id=2, name=Jim");
    }
}
