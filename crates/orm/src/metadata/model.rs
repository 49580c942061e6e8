//! Model definitions - the statically registered description of one model type

use serde::{Deserialize, Serialize};

use super::column::ColumnDescriptor;
use super::relationship::RelationshipDescriptor;
use super::table::{TableDescriptor, ValidationRule};

/// One declared property of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,

    /// Declared type of the property when it is another model
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub column: Option<ColumnDescriptor>,

    #[serde(default)]
    pub rules: Vec<ValidationRule>,

    #[serde(default)]
    pub relationship: Option<RelationshipDescriptor>,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: None,
            column: None,
            rules: Vec::new(),
            relationship: None,
        }
    }

    /// Declare the property's type as another model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.column = Some(column);
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn relationship(mut self, relationship: RelationshipDescriptor) -> Self {
        self.relationship = Some(relationship);
        self
    }
}

/// Full metadata of one model type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Registered model name, also stored as the discriminator tag
    pub name: String,

    /// Super-model this model derives from
    #[serde(default)]
    pub extends: Option<String>,

    #[serde(default)]
    pub table: Option<TableDescriptor>,

    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,

    /// Computed attribute names appended to serialized output
    #[serde(default)]
    pub appends: Vec<String>,

    /// Abstract models are never instantiated nor migrated
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
            table: None,
            properties: Vec::new(),
            appends: Vec::new(),
            is_abstract: false,
        }
    }

    pub fn extends(mut self, model: impl Into<String>) -> Self {
        self.extends = Some(model.into());
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(TableDescriptor::new(table));
        self
    }

    /// Map to a table whose rows are split with a parent model's table
    pub fn table_with_parent(mut self, table: impl Into<String>, parent: impl Into<String>) -> Self {
        self.table = Some(TableDescriptor::new(table).with_parent(parent));
        self
    }

    pub fn property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }

    /// Shorthand for a property carrying only a column
    pub fn column(self, name: impl Into<String>, column: ColumnDescriptor) -> Self {
        self.property(PropertyDefinition::new(name).column(column))
    }

    pub fn append(mut self, attribute: impl Into<String>) -> Self {
        self.appends.push(attribute.into());
        self
    }

    pub fn abstract_model(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Table-split parent model, if any
    pub fn parent(&self) -> Option<&str> {
        self.table.as_ref().and_then(|t| t.parent.as_deref())
    }
}
