//! Model catalog: the registry plus per-type descriptor cache
//!
//! Descriptors are computed on first use and never change afterwards.
//! Appended attributes get their values from accessors registered here.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use tracing::debug;

use crate::error::{OrmError, OrmResult};
use crate::reflector::Reflector;
use crate::registry::ModelRegistry;
use crate::relationships::{RelationDefinition, RelationKind};
use crate::resolver::ColumnResolver;
use crate::validation::Validator;
use crate::value::{Attributes, Value};

use super::descriptor::ModelDescriptor;
use super::record::Record;

/// Computes the value of an appended attribute
pub type Accessor = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

pub struct ModelCatalog {
    registry: ModelRegistry,
    descriptors: DashMap<String, Arc<ModelDescriptor>>,
    accessors: DashMap<(String, String), Accessor>,
}

impl fmt::Debug for ModelCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCatalog")
            .field("models", &self.registry.len())
            .field("descriptors", &self.descriptors.len())
            .field("accessors", &self.accessors.len())
            .finish()
    }
}

impl ModelCatalog {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry,
            descriptors: DashMap::new(),
            accessors: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Descriptor of a model type, computed once and cached
    pub fn descriptor(&self, model: &str) -> OrmResult<Arc<ModelDescriptor>> {
        if let Some(cached) = self.descriptors.get(model) {
            return Ok(Arc::clone(cached.value()));
        }

        // Built without holding a map guard: building recurses into the parent.
        let built = Arc::new(self.build(model)?);
        let entry = self
            .descriptors
            .entry(model.to_string())
            .or_insert(built);
        Ok(Arc::clone(entry.value()))
    }

    /// Fresh, unsaved instance of a model type
    pub fn instantiate(&self, model: &str) -> OrmResult<Record> {
        let definition = self.registry.require(model)?;
        if definition.is_abstract {
            return Err(OrmError::metadata(model, "abstract models cannot be instantiated"));
        }
        Ok(Record::new(self.descriptor(model)?))
    }

    /// Fresh instance mass-assigned from `attributes`
    pub fn make(&self, model: &str, attributes: Attributes) -> OrmResult<Record> {
        let mut record = self.instantiate(model)?;
        record.fill(attributes);
        Ok(record)
    }

    /// Register the accessor computing an appended attribute of `model`
    pub fn register_accessor<F>(&self, model: &str, attribute: &str, accessor: F)
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        self.accessors
            .insert((model.to_string(), attribute.to_string()), Arc::new(accessor));
    }

    /// Accessor for `attribute`, searched from the model up its `extends` chain
    pub fn accessor(&self, model: &str, attribute: &str) -> Option<Accessor> {
        let mut chain = vec![model.to_string()];
        if let Ok(ancestors) = self.registry.ancestors(model) {
            chain.extend(ancestors.iter().rev().map(|definition| definition.name.clone()));
        }
        chain.into_iter().find_map(|name| {
            self.accessors
                .get(&(name, attribute.to_string()))
                .map(|found| Arc::clone(found.value()))
        })
    }

    pub fn validator(&self, model: &str) -> OrmResult<Validator> {
        Ok(Validator::new(self.descriptor(model)?.validation.clone()))
    }

    /// Validate attributes against the model's declared rules
    pub fn validate(&self, model: &str, attributes: &Attributes) -> OrmResult<()> {
        self.validator(model)?.validate(attributes)?;
        Ok(())
    }

    fn build(&self, model: &str) -> OrmResult<ModelDescriptor> {
        self.registry.require(model)?;
        let reflector = Reflector::new(&self.registry);
        let columns = ColumnResolver::new(&self.registry).resolve(model)?;
        let parent = reflector.find_parent_type(model);
        let parent_descriptor = parent.as_deref().map(|p| self.descriptor(p)).transpose()?;

        let mut fillable = Vec::new();
        let mut hidden = Vec::new();
        let mut casts = IndexMap::new();
        for column in columns.iter() {
            if column.descriptor.fillable {
                push_unique(&mut fillable, &column.name);
            }
            if column.descriptor.hidden {
                push_unique(&mut hidden, &column.name);
            }
            if let Some(cast) = column.descriptor.cast_name() {
                casts.insert(column.name.clone(), cast.to_string());
            }
        }

        let mut relations = IndexMap::new();
        let mut with = Vec::new();
        for property in reflector.describe_relationships(model) {
            let relation = RelationDefinition::from_property(model, &property)?;
            if let RelationKind::BelongsTo { foreign_key, .. } = &relation.kind {
                push_unique(&mut fillable, foreign_key);
                push_unique(&mut hidden, foreign_key);
            }
            if relation.eager {
                push_unique(&mut with, &relation.name);
            }
            relations.insert(relation.name.clone(), relation);
        }

        let mut parent_columns = Vec::new();
        if let Some(parent) = &parent_descriptor {
            for name in &parent.fillable {
                push_unique(&mut fillable, name);
            }
            for name in &parent.hidden {
                push_unique(&mut hidden, name);
            }
            for (name, cast) in &parent.casts {
                casts.entry(name.clone()).or_insert_with(|| cast.clone());
            }
            parent_columns = parent.columns.names().map(str::to_string).collect();
        }

        debug!(
            "Built descriptor for {}: {} columns, {} relations",
            model,
            columns.len(),
            relations.len()
        );

        Ok(ModelDescriptor {
            name: model.to_string(),
            table: reflector.describe_table(model).table,
            parent,
            children: reflector.find_child_types(model),
            columns,
            parent_columns,
            fillable,
            hidden,
            casts,
            appends: reflector.appends(model),
            with,
            relations,
            validation: reflector.describe_validation(model),
        })
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|existing| existing == name) {
        list.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes;
    use crate::metadata::{ColumnDescriptor, ModelDefinition, PropertyDefinition, RelationshipDescriptor, ValidationRule};
    use crate::registry::BASE_MODEL;
    use pretty_assertions::assert_eq;

    fn catalog() -> ModelCatalog {
        let mut registry = ModelRegistry::with_base();
        registry
            .register(
                ModelDefinition::new("Customer")
                    .extends(BASE_MODEL)
                    .table("customers")
                    .property(
                        PropertyDefinition::new("email")
                            .column(ColumnDescriptor::string())
                            .rule(ValidationRule::new("required"))
                            .rule(ValidationRule::new("email")),
                    )
                    .column("password", ColumnDescriptor::string().hidden().guarded())
                    .append("displayName"),
            )
            .unwrap();
        registry
            .register(
                ModelDefinition::new("Order")
                    .extends(BASE_MODEL)
                    .table("orders")
                    .property(
                        PropertyDefinition::new("customer")
                            .model("Customer")
                            .relationship(RelationshipDescriptor::belongs_to().with_eager()),
                    )
                    .property(
                        PropertyDefinition::new("lines").relationship(RelationshipDescriptor::has_many("Customer")),
                    )
                    .column("total", ColumnDescriptor::integer().cast("integer")),
            )
            .unwrap();
        ModelCatalog::new(registry)
    }

    #[test]
    fn test_descriptor_lists_are_deduplicated() {
        let catalog = catalog();
        let order = catalog.descriptor("Order").unwrap();
        assert_eq!(order.fillable, vec!["id", "created_at", "updated_at", "deleted_at", "total", "customer_id"]);
        assert_eq!(order.hidden, vec!["id", "deleted_at", "customer_id"]);
        assert_eq!(order.with, vec!["customer"]);
        assert_eq!(order.casts.get("total").map(String::as_str), Some("integer"));
        assert_eq!(order.casts.get("created_at").map(String::as_str), Some("datetime"));

        let customer = catalog.descriptor("Customer").unwrap();
        assert!(!customer.is_fillable("password"));
        assert_eq!(customer.appends, vec!["display_name"]);
    }

    #[test]
    fn test_descriptor_is_cached() {
        let catalog = catalog();
        let first = catalog.descriptor("Order").unwrap();
        let second = catalog.descriptor("Order").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_accessor_and_hidden_in_json() {
        let catalog = catalog();
        catalog.register_accessor("Customer", "display_name", |record| {
            Value::from(format!("<{}>", record.get("email").map(|v| v.to_string()).unwrap_or_default()))
        });
        let mut customer = catalog.make("Customer", attributes! { "email" => "ada@example.com" }).unwrap();
        customer.set("password", "secret");

        let json = customer.to_json(&catalog);
        assert_eq!(json["email"], "ada@example.com");
        assert_eq!(json["display_name"], "<ada@example.com>");
        assert!(json.get("password").is_none());
    }

    #[test]
    fn test_validate_uses_record_column_names() {
        let mut registry = ModelRegistry::with_base();
        registry
            .register(
                ModelDefinition::new("Person")
                    .extends(BASE_MODEL)
                    .property(
                        PropertyDefinition::new("firstName")
                            .column(ColumnDescriptor::string())
                            .rule(ValidationRule::new("required")),
                    ),
            )
            .unwrap();
        let catalog = ModelCatalog::new(registry);

        assert!(catalog.validate("Person", &attributes! { "first_name" => "Ada" }).is_ok());
        let Err(OrmError::Validation(errors)) = catalog.validate("Person", &Attributes::new()) else {
            panic!("expected validation errors");
        };
        assert!(errors.get("first_name").is_some());
    }

    #[test]
    fn test_synthesized_columns_are_not_fillable() {
        let mut registry = ModelRegistry::with_base();
        registry
            .register(ModelDefinition::new("Shape").extends(BASE_MODEL).column("color", ColumnDescriptor::string()))
            .unwrap();
        registry
            .register(
                ModelDefinition::new("Circle")
                    .extends("Shape")
                    .table_with_parent("circles", "Shape")
                    .column("radius", ColumnDescriptor::integer()),
            )
            .unwrap();
        let catalog = ModelCatalog::new(registry);

        let shape = catalog.descriptor("Shape").unwrap();
        assert!(shape.has_column("type"));
        assert!(!shape.is_fillable("type"));

        let circle = catalog.descriptor("Circle").unwrap();
        assert!(circle.has_column("shape_id"));
        assert!(!circle.is_fillable("shape_id"));
        assert!(circle.is_fillable("radius"));
    }

    #[test]
    fn test_validate_and_abstract_instantiation() {
        let catalog = catalog();
        let err = catalog.validate("Customer", &attributes! { "email" => "nope" }).unwrap_err();
        assert!(matches!(err, OrmError::Validation(_)));
        assert!(catalog.instantiate(BASE_MODEL).is_err());
    }
}
