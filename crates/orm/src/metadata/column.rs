//! Column descriptor - the intended definition of one database column

use serde::{Deserialize, Serialize};

use crate::value::Value;

fn default_type() -> String {
    "string".to_string()
}

fn default_true() -> bool {
    true
}

/// Declared definition of one database column
///
/// `sql_type` is a schema-builder tag (`id`, `string`, `integer`,
/// `timestamp`, `timestamps`, `rememberToken`, ...) or a free-form engine
/// type passed through to the generated DDL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name override; derived from the property name when absent
    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "type", default = "default_type")]
    pub sql_type: String,

    /// Whether the column accepts mass assignment
    #[serde(default = "default_true")]
    pub fillable: bool,

    /// Whether the column is omitted from serialized output
    #[serde(default)]
    pub hidden: bool,

    /// Cast registered for the column
    #[serde(default)]
    pub cast: Option<String>,

    #[serde(default)]
    pub nullable: bool,

    #[serde(default)]
    pub default: Option<Value>,

    #[serde(default)]
    pub length: Option<u32>,

    #[serde(default)]
    pub index: bool,
}

impl Default for ColumnDescriptor {
    fn default() -> Self {
        Self {
            name: None,
            sql_type: default_type(),
            fillable: true,
            hidden: false,
            cast: None,
            nullable: false,
            default: None,
            length: None,
            index: false,
        }
    }
}

impl ColumnDescriptor {
    /// Create a column of the given type tag
    pub fn new(sql_type: impl Into<String>) -> Self {
        Self {
            sql_type: sql_type.into(),
            ..Default::default()
        }
    }

    /// Auto-increment primary key column
    pub fn id() -> Self {
        Self::new("id")
    }

    pub fn string() -> Self {
        Self::new("string")
    }

    pub fn integer() -> Self {
        Self::new("integer")
    }

    pub fn timestamp() -> Self {
        Self::new("timestamp")
    }

    /// Conventional created/updated timestamp pair
    pub fn timestamps() -> Self {
        Self::new("timestamps")
    }

    pub fn remember_token() -> Self {
        Self::new("rememberToken")
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Exclude the column from mass assignment
    pub fn guarded(mut self) -> Self {
        self.fillable = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn cast(mut self, cast: impl Into<String>) -> Self {
        self.cast = Some(cast.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    /// Declared length, ignoring a zero length
    pub fn effective_length(&self) -> Option<u32> {
        self.length.filter(|len| *len > 0)
    }

    /// Cast name when one is declared and non-empty
    pub fn cast_name(&self) -> Option<&str> {
        self.cast.as_deref().filter(|cast| !cast.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_attribute_defaults() {
        let column = ColumnDescriptor::default();
        assert_eq!(column.sql_type, "string");
        assert!(column.fillable);
        assert!(!column.hidden && !column.nullable && !column.index);
    }

    #[test]
    fn test_deserialize_with_type_key() {
        let column: ColumnDescriptor =
            serde_json::from_str(r#"{"type": "integer", "nullable": true, "default": 0}"#)
                .unwrap();
        assert_eq!(column.sql_type, "integer");
        assert!(column.nullable);
        assert_eq!(column.default, Some(Value::Integer(0)));
        assert!(column.fillable);
    }

    #[test]
    fn test_zero_length_is_ignored() {
        assert_eq!(ColumnDescriptor::string().length(0).effective_length(), None);
        assert_eq!(ColumnDescriptor::string().length(80).effective_length(), Some(80));
        assert_eq!(ColumnDescriptor::string().cast("").cast_name(), None);
    }
}
