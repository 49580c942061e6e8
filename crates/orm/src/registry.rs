//! Model Registry - explicit startup-time registration of model definitions
//!
//! Replaces filesystem/namespace discovery: every concrete model registers
//! its definition, and subclass relationships are read from the registered
//! `extends` chains. Registration order is preserved and drives every
//! ordered output derived from the registry.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{OrmError, OrmResult};
use crate::metadata::{ColumnDescriptor, ModelDefinition, PropertyDefinition, RelationshipDescriptor};
use crate::naming::{CREATED_AT, DELETED_AT, PRIMARY_KEY, UPDATED_AT};

/// Name of the built-in abstract base model
pub const BASE_MODEL: &str = "Model";

/// Registry of model definitions keyed by model name
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelDefinition>,
}

impl ModelRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in base model
    pub fn with_base() -> Self {
        let mut registry = Self::new();
        registry
            .models
            .insert(BASE_MODEL.to_string(), Self::base_definition());
        registry
    }

    /// Built-in base: primary key, timestamps and soft-delete column
    pub fn base_definition() -> ModelDefinition {
        ModelDefinition::new(BASE_MODEL)
            .abstract_model()
            .property(PropertyDefinition::new("_id").column(
                ColumnDescriptor::id().named(PRIMARY_KEY).hidden(),
            ))
            .property(
                PropertyDefinition::new("_created_at").column(
                    ColumnDescriptor::timestamp()
                        .named(CREATED_AT)
                        .cast("datetime")
                        .nullable(),
                ),
            )
            .property(
                PropertyDefinition::new("_updated_at").column(
                    ColumnDescriptor::timestamp()
                        .named(UPDATED_AT)
                        .cast("datetime")
                        .nullable(),
                ),
            )
            .property(
                PropertyDefinition::new("_deleted_at").column(
                    ColumnDescriptor::timestamp()
                        .named(DELETED_AT)
                        .hidden()
                        .cast("datetime")
                        .nullable(),
                ),
            )
    }

    /// Build a registry from definitions, rejecting duplicate names
    pub fn from_definitions<I>(definitions: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = ModelDefinition>,
    {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    /// Register a model definition
    pub fn register(&mut self, definition: ModelDefinition) -> OrmResult<()> {
        if self.models.contains_key(&definition.name) {
            return Err(OrmError::metadata(
                &definition.name,
                "model is already registered",
            ));
        }
        debug!("Registering model '{}'", definition.name);
        self.models.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ModelDefinition> {
        self.models.get(name)
    }

    /// Get a definition or fail with `UnknownModel`
    pub fn require(&self, name: &str) -> OrmResult<&ModelDefinition> {
        self.get(name)
            .ok_or_else(|| OrmError::UnknownModel(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// All definitions in registration order
    pub fn definitions(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.models.values()
    }

    /// Instantiable definitions in registration order
    pub fn concrete_models(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.models.values().filter(|model| !model.is_abstract)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Super-models of `name`, root first, excluding the model itself
    pub fn ancestors(&self, name: &str) -> OrmResult<Vec<&ModelDefinition>> {
        let mut chain = Vec::new();
        let mut current = self.require(name)?;

        while let Some(parent) = current.extends.as_deref() {
            if parent == name || chain.iter().any(|m: &&ModelDefinition| m.name == parent) {
                return Err(OrmError::metadata(name, "inheritance cycle in `extends` chain"));
            }
            current = self.get(parent).ok_or_else(|| {
                OrmError::metadata(name, format!("extends unknown model '{}'", parent))
            })?;
            chain.push(current);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Whether `candidate` strictly derives from `ancestor`
    pub fn is_descendant(&self, candidate: &str, ancestor: &str) -> bool {
        self.ancestors(candidate)
            .map(|chain| chain.iter().any(|m| m.name == ancestor))
            .unwrap_or(false)
    }

    /// Check every cross-model reference and return the problems found
    pub fn validate(&self) -> Vec<OrmError> {
        let mut problems = Vec::new();

        for model in self.models.values() {
            if let Err(err) = self.ancestors(&model.name) {
                problems.push(err);
            }

            if let Some(parent) = model.parent() {
                if !self.contains(parent) {
                    problems.push(OrmError::metadata(
                        &model.name,
                        format!("table parent '{}' is not registered", parent),
                    ));
                }
            }

            for property in &model.properties {
                let mut referenced: Vec<&str> = property.model.as_deref().into_iter().collect();
                match &property.relationship {
                    Some(RelationshipDescriptor::HasMany { related, .. }) => referenced.push(related),
                    Some(RelationshipDescriptor::HasOneThrough { through, .. }) => {
                        referenced.push(through)
                    }
                    _ => {}
                }
                for name in referenced {
                    if !self.contains(name) {
                        problems.push(OrmError::metadata(
                            &model.name,
                            format!("property '{}' references unknown model '{}'", property.name, name),
                        ));
                    }
                }
            }
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::with_base();
        registry
            .register(ModelDefinition::new("Vehicle").extends(BASE_MODEL).table("vehicles"))
            .unwrap();
        registry
            .register(
                ModelDefinition::new("Car")
                    .extends("Vehicle")
                    .table_with_parent("cars", "Vehicle"),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_ancestors_are_root_first() {
        let registry = registry();
        let names: Vec<_> = registry
            .ancestors("Car")
            .unwrap()
            .into_iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec![BASE_MODEL, "Vehicle"]);
        assert!(registry.ancestors(BASE_MODEL).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = registry();
        let err = registry.register(ModelDefinition::new("Car")).unwrap_err();
        assert!(err.is_discovery_error());
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut registry = ModelRegistry::new();
        registry.register(ModelDefinition::new("A").extends("B")).unwrap();
        registry.register(ModelDefinition::new("B").extends("A")).unwrap();
        assert!(registry.ancestors("A").is_err());
        assert!(!registry.is_descendant("A", "B"));
        assert_eq!(registry.validate().len(), 2);
    }

    #[test]
    fn test_validate_flags_unknown_references() {
        let mut registry = registry();
        registry
            .register(
                ModelDefinition::new("Trip")
                    .extends(BASE_MODEL)
                    .table("trips")
                    .property(PropertyDefinition::new("driver").model("Driver")),
            )
            .unwrap();
        let problems = registry.validate();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].to_string().contains("Driver"));
    }

    #[test]
    fn test_concrete_models_skip_abstract_base() {
        let registry = registry();
        let names: Vec<_> = registry.concrete_models().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Vehicle", "Car"]);
        assert!(registry.is_descendant("Car", "Vehicle"));
        assert!(!registry.is_descendant("Vehicle", "Car"));
    }
}
