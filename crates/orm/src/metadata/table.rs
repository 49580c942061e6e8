//! Table-level and validation descriptors

use serde::{Deserialize, Serialize};

/// Table mapping of a model
///
/// A `parent` declares single-level inheritance: the model's rows are split
/// between its own table and the parent model's table, joined by a link
/// column named after the parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub table: String,
    #[serde(default)]
    pub parent: Option<String>,
}

impl TableDescriptor {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            parent: None,
        }
    }

    /// Split rows with the given parent model
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// One validation rule on a property; repeatable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub rule: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl ValidationRule {
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
