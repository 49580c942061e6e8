//! Reflector - read-only metadata extraction over the model registry
//!
//! Every query walks the registered `extends` chain root first, so inherited
//! declarations precede the model's own. Models lacking metadata yield empty
//! results rather than errors.

use indexmap::IndexMap;

use crate::metadata::{ColumnDescriptor, ModelDefinition, RelationshipDescriptor, TableDescriptor};
use crate::naming;
use crate::registry::ModelRegistry;

/// One declared column together with the property carrying it
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredColumn {
    pub property: String,
    pub column: ColumnDescriptor,
    /// Declared model type of the property, if it is a model
    pub model: Option<String>,
    /// Model whose definition declares the property
    pub declared_by: String,
}

impl DeclaredColumn {
    /// Column name before foreign-key renaming: the override or snake_case(property)
    pub fn declared_name(&self) -> String {
        self.column
            .name
            .clone()
            .unwrap_or_else(|| naming::snake_case(&self.property))
    }

    /// Stored column name: a model-typed property without an override
    /// becomes the related model's foreign key
    pub fn column_name(&self) -> String {
        column_name(&self.property, &self.column, self.model.as_deref())
    }
}

fn column_name(property: &str, column: &ColumnDescriptor, model: Option<&str>) -> String {
    match (&column.name, model) {
        (Some(name), _) => name.clone(),
        (None, Some(related)) => naming::foreign_key(related),
        (None, None) => naming::snake_case(property),
    }
}

/// One relationship-annotated property
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipProperty {
    pub property: String,
    /// Declared model type of the property
    pub model: Option<String>,
    pub descriptor: RelationshipDescriptor,
}

/// Validation rules keyed by column, then rule expression
pub type ValidationRules = IndexMap<String, IndexMap<String, Option<String>>>;

/// Registry-backed metadata introspection
#[derive(Debug, Clone, Copy)]
pub struct Reflector<'a> {
    registry: &'a ModelRegistry,
}

impl<'a> Reflector<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'a ModelRegistry {
        self.registry
    }

    /// Definitions along the `extends` chain, root first, ending with the model
    ///
    /// A broken chain degrades to the model's own definition.
    fn chain(&self, model: &str) -> Vec<&'a ModelDefinition> {
        let Some(own) = self.registry.get(model) else {
            return Vec::new();
        };
        let mut chain = self.registry.ancestors(model).unwrap_or_default();
        chain.push(own);
        chain
    }

    /// Table mapping; falls back to the naming convention when undeclared
    pub fn describe_table(&self, model: &str) -> TableDescriptor {
        self.registry
            .get(model)
            .and_then(|definition| definition.table.clone())
            .unwrap_or_else(|| TableDescriptor::new(naming::table_name(model)))
    }

    /// Whether the model carries an explicit table mapping
    pub fn has_table_attribute(&self, model: &str) -> bool {
        self.registry
            .get(model)
            .map(|definition| definition.table.is_some())
            .unwrap_or(false)
    }

    /// Declared columns in chain order
    ///
    /// A property redeclared further down the chain keeps its first position
    /// and takes the most-derived descriptor.
    pub fn describe_columns(&self, model: &str) -> Vec<DeclaredColumn> {
        let mut columns: IndexMap<String, DeclaredColumn> = IndexMap::new();

        for definition in self.chain(model) {
            for property in &definition.properties {
                let Some(column) = &property.column else {
                    continue;
                };
                let declared = DeclaredColumn {
                    property: property.name.clone(),
                    column: column.clone(),
                    model: property.model.clone(),
                    declared_by: definition.name.clone(),
                };
                match columns.get_mut(&property.name) {
                    Some(existing) => *existing = declared,
                    None => {
                        columns.insert(property.name.clone(), declared);
                    }
                }
            }
        }

        columns.into_values().collect()
    }

    /// Declared columns of the model's own definition only
    pub fn own_columns(&self, model: &str) -> Vec<DeclaredColumn> {
        self.describe_columns(model)
            .into_iter()
            .filter(|column| column.declared_by == model)
            .collect()
    }

    /// Relationship-annotated properties in chain order
    pub fn describe_relationships(&self, model: &str) -> Vec<RelationshipProperty> {
        let mut relations: IndexMap<String, RelationshipProperty> = IndexMap::new();

        for definition in self.chain(model) {
            for property in &definition.properties {
                if let Some(descriptor) = &property.relationship {
                    relations.insert(
                        property.name.clone(),
                        RelationshipProperty {
                            property: property.name.clone(),
                            model: property.model.clone(),
                            descriptor: descriptor.clone(),
                        },
                    );
                }
            }
        }

        relations.into_values().collect()
    }

    /// Validation rules of column-bearing properties
    ///
    /// Keyed by the stored column name, the same one records carry. A
    /// repeated rule expression keeps the last message.
    pub fn describe_validation(&self, model: &str) -> ValidationRules {
        let mut rules = ValidationRules::new();

        for definition in self.chain(model) {
            for property in &definition.properties {
                let Some(column) = &property.column else {
                    continue;
                };
                if property.rules.is_empty() {
                    continue;
                }
                let key = column_name(&property.name, column, property.model.as_deref());
                let entry = rules.entry(key).or_default();
                for rule in &property.rules {
                    entry.insert(rule.rule.clone(), rule.message.clone());
                }
            }
        }

        rules
    }

    /// Table-split parent of the model
    pub fn find_parent_type(&self, model: &str) -> Option<String> {
        self.registry
            .get(model)
            .and_then(|definition| definition.parent())
            .map(str::to_string)
    }

    /// Concrete registered descendants, in registration order
    pub fn find_child_types(&self, model: &str) -> Vec<String> {
        self.registry
            .concrete_models()
            .filter(|candidate| self.registry.is_descendant(&candidate.name, model))
            .map(|candidate| candidate.name.clone())
            .collect()
    }

    /// Appended computed attributes along the chain, snake_cased and de-duplicated
    pub fn appends(&self, model: &str) -> Vec<String> {
        let mut appends: Vec<String> = Vec::new();
        for definition in self.chain(model) {
            for append in &definition.appends {
                let name = naming::snake_case(append);
                if !appends.contains(&name) {
                    appends.push(name);
                }
            }
        }
        appends
    }
}
