//! Immutable per-type model descriptor

use indexmap::IndexMap;

use crate::naming::{self, DELETED_AT};
use crate::reflector::ValidationRules;
use crate::relationships::RelationDefinition;
use crate::resolver::EffectiveColumnSet;

/// Everything an instance of one model type needs at runtime
///
/// Computed once per type by the catalog and shared by reference among all
/// records of that type.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    pub name: String,
    pub table: String,
    /// Table-split parent type
    pub parent: Option<String>,
    /// Concrete registered descendants, the closed set of discriminator tags
    pub children: Vec<String>,
    pub columns: EffectiveColumnSet,
    /// Effective column names of the parent type, empty without a parent
    pub parent_columns: Vec<String>,
    pub fillable: Vec<String>,
    pub hidden: Vec<String>,
    pub casts: IndexMap<String, String>,
    pub appends: Vec<String>,
    /// Relations loaded with the record on retrieval
    pub with: Vec<String>,
    pub relations: IndexMap<String, RelationDefinition>,
    pub validation: ValidationRules,
}

impl ModelDescriptor {
    /// Whether the model stores part of its attributes in a parent table
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    pub fn is_polymorphic(&self) -> bool {
        !self.children.is_empty()
    }

    /// Column linking a child row to its parent row
    pub fn parent_link_column(&self) -> Option<String> {
        self.parent.as_deref().map(naming::foreign_key)
    }

    pub fn soft_deletes(&self) -> bool {
        self.columns.contains(DELETED_AT)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    pub fn is_fillable(&self, name: &str) -> bool {
        self.fillable.iter().any(|f| f == name)
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden.iter().any(|h| h == name)
    }

    /// Closed-set lookup of a stored discriminator tag
    pub fn resolve_tag(&self, tag: &str) -> Option<&str> {
        self.children
            .iter()
            .find(|child| child.as_str() == tag)
            .map(String::as_str)
    }

    /// Relation by property name or alias
    pub fn relation(&self, name: &str) -> Option<&RelationDefinition> {
        self.relations
            .get(name)
            .or_else(|| self.relations.values().find(|r| r.answers_to(name)))
    }

    /// Columns stored on the model's own table and not on the parent's
    pub fn own_columns(&self) -> Vec<&str> {
        self.columns
            .names()
            .filter(|name| !self.parent_columns.iter().any(|p| p == name))
            .collect()
    }
}
