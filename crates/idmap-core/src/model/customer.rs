use serde::{Deserialize, Serialize};

use crate::errors::{IdmapError, Result};
use crate::model::entity::{optional_integer, optional_text, required_text, Entity};
use crate::model::values::{ColumnKind, PropertyValues};

/// Maximum length, in characters, of `name` and `state`
pub const MAX_TEXT_LEN: usize = 255;

/// A customer row
///
/// `id` is zero until the store assigns one on insert.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub state: Option<String>,
}

impl Customer {
    /// New, not yet persisted customer
    pub fn new(name: impl Into<String>, state: Option<&str>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            state: state.map(str::to_string),
        }
    }
}

impl Entity for Customer {
    const ENTITY_TYPE: &'static str = "Customer";
    const TABLE: &'static str = "customers";
    const KEY_COLUMN: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &["name", "state"];

    fn column_kind(column: &str) -> Option<ColumnKind> {
        match column {
            "name" | "state" => Some(ColumnKind::Text),
            _ => None,
        }
    }

    fn key(&self) -> Option<i64> {
        (self.id > 0).then_some(self.id)
    }

    fn set_key(&mut self, id: i64) {
        self.id = id;
    }

    fn to_values(&self) -> PropertyValues {
        PropertyValues::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
            .with("state", self.state.clone())
    }

    fn from_values(values: &PropertyValues) -> Result<Self> {
        Ok(Self {
            id: optional_integer::<Self>(values, "id")?.unwrap_or(0),
            name: required_text::<Self>(values, "name")?,
            state: optional_text::<Self>(values, "state")?,
        })
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| IdmapError::Validation {
            entity_type: Self::ENTITY_TYPE,
            id: self.key(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is required".to_string()));
        }
        if self.name.chars().count() > MAX_TEXT_LEN {
            return Err(invalid(format!(
                "name exceeds {} characters",
                MAX_TEXT_LEN
            )));
        }
        if let Some(state) = &self.state {
            if state.chars().count() > MAX_TEXT_LEN {
                return Err(invalid(format!(
                    "state exceeds {} characters",
                    MAX_TEXT_LEN
                )));
            }
        }
        Ok(())
    }
}
