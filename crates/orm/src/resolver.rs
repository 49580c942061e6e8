//! Column Resolver - the effective, ordered column set of a model type
//!
//! Merges declared and inherited columns, renames model-typed properties to
//! their foreign key, drops columns owned by an upstream table, then appends
//! the synthesized parent-link and discriminator columns in that order.
//! Resolution is a pure function of the registry.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{OrmError, OrmResult};
use crate::metadata::ColumnDescriptor;
use crate::naming;
use crate::reflector::Reflector;
use crate::registry::ModelRegistry;

/// How a column entered the effective set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnOrigin {
    /// Declared by the model itself
    Declared,
    /// Declared by a super-model along the `extends` chain
    Inherited,
    /// Synthesized link to the table-split parent row
    ParentLink,
    /// Synthesized discriminator of a polymorphic parent
    Discriminator,
}

impl ColumnOrigin {
    pub fn is_synthesized(self) -> bool {
        matches!(self, Self::ParentLink | Self::Discriminator)
    }
}

/// One column of an effective set
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumn {
    pub name: String,
    pub descriptor: ColumnDescriptor,
    pub origin: ColumnOrigin,
    /// Declaring property, absent for synthesized columns
    pub property: Option<String>,
    /// Related model when the property is model-typed
    pub related: Option<String>,
}

/// Ordered mapping of resolved column name to its definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveColumnSet {
    columns: IndexMap<String, ResolvedColumn>,
}

impl EffectiveColumnSet {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedColumn> {
        self.columns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Position of a column in resolved order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.get_index_of(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedColumn> {
        self.columns.values()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn insert(&mut self, column: ResolvedColumn) {
        match self.columns.get_mut(&column.name) {
            Some(existing) => *existing = column,
            None => {
                self.columns.insert(column.name.clone(), column);
            }
        }
    }
}

/// Computes effective column sets from registered metadata
#[derive(Debug, Clone, Copy)]
pub struct ColumnResolver<'a> {
    reflector: Reflector<'a>,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self {
            reflector: Reflector::new(registry),
        }
    }

    /// Resolve the effective column set of a model
    pub fn resolve(&self, model: &str) -> OrmResult<EffectiveColumnSet> {
        let mut stack = Vec::new();
        self.resolve_guarded(model, &mut stack)
    }

    fn resolve_guarded(&self, model: &str, stack: &mut Vec<String>) -> OrmResult<EffectiveColumnSet> {
        let registry = self.reflector.registry();
        registry.require(model)?;

        if stack.iter().any(|visited| visited == model) {
            return Err(OrmError::metadata(model, "table parent chain is cyclic"));
        }
        stack.push(model.to_string());

        let declared = self.reflector.describe_columns(model);
        if declared.is_empty() {
            return Err(OrmError::metadata(model, "model declares no column metadata"));
        }

        let ancestors = registry.ancestors(model)?;
        let parent = self.reflector.find_parent_type(model);

        // Columns of the root base stay on every table; anything else already
        // stored upstream is not duplicated here.
        let upstream = match (ancestors.first(), parent.as_deref()) {
            (Some(base), Some(parent)) => {
                let base_names: Vec<String> = self
                    .reflector
                    .own_columns(&base.name)
                    .into_iter()
                    .map(|column| column.declared_name())
                    .collect();
                let mut upstream = self.upstream_columns(parent, stack)?;
                upstream.retain(|name| !base_names.contains(name));
                upstream
            }
            _ => Vec::new(),
        };

        let mut set = EffectiveColumnSet::default();
        for column in declared {
            let mut descriptor = column.column.clone();
            let name = column.column_name();

            if let Some(related) = &column.model {
                if !registry.contains(related) {
                    return Err(OrmError::metadata(
                        model,
                        format!("property '{}' references unknown model '{}'", column.property, related),
                    ));
                }
                descriptor.sql_type = "integer".to_string();
            }

            let origin = if column.declared_by == model {
                ColumnOrigin::Declared
            } else {
                ColumnOrigin::Inherited
            };

            if origin == ColumnOrigin::Inherited && upstream.contains(&name) {
                debug!("Column '{}' of '{}' lives on the parent table", name, model);
                continue;
            }

            set.insert(ResolvedColumn {
                name,
                descriptor,
                origin,
                property: Some(column.property.clone()),
                related: column.model.clone(),
            });
        }

        if let Some(parent) = &parent {
            let link = naming::foreign_key(parent);
            set.columns.shift_remove(&link);
            set.insert(ResolvedColumn {
                name: link,
                descriptor: ColumnDescriptor::integer().hidden().nullable().guarded(),
                origin: ColumnOrigin::ParentLink,
                property: None,
                related: Some(parent.clone()),
            });
        }

        if !self.reflector.find_child_types(model).is_empty() && !set.contains(naming::DISCRIMINATOR) {
            set.insert(ResolvedColumn {
                name: naming::DISCRIMINATOR.to_string(),
                descriptor: ColumnDescriptor::string()
                    .named(naming::DISCRIMINATOR)
                    .hidden()
                    .nullable()
                    .guarded(),
                origin: ColumnOrigin::Discriminator,
                property: None,
                related: None,
            });
        }

        stack.pop();
        debug!("Resolved {} columns for '{}'", set.len(), model);
        Ok(set)
    }

    /// Column names stored on the parent's table and every table above it
    fn upstream_columns(&self, parent: &str, stack: &mut Vec<String>) -> OrmResult<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        let mut visited: Vec<String> = Vec::new();
        let mut current = Some(parent.to_string());

        while let Some(model) = current {
            if visited.contains(&model) {
                return Err(OrmError::metadata(parent, "table parent chain is cyclic"));
            }
            let set = self.resolve_guarded(&model, stack)?;
            for name in set.names() {
                if !names.iter().any(|known| known == name) {
                    names.push(name.to_string());
                }
            }
            current = self.reflector.find_parent_type(&model);
            visited.push(model);
        }

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ModelDefinition, PropertyDefinition, RelationshipDescriptor};
    use crate::registry::BASE_MODEL;
    use pretty_assertions::assert_eq;

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::with_base();
        registry
            .register(
                ModelDefinition::new("Customer")
                    .extends(BASE_MODEL)
                    .table("customers")
                    .column("name", ColumnDescriptor::string()),
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
                            .column(ColumnDescriptor::string().hidden())
                            .relationship(RelationshipDescriptor::belongs_to()),
                    )
                    .property(
                        PropertyDefinition::new("approver")
                            .model("Customer")
                            .column(ColumnDescriptor::string().named("approved_by")),
                    )
                    .column("totalCents", ColumnDescriptor::integer()),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_model_typed_property_becomes_integer_foreign_key() {
        let registry = registry();
        let set = ColumnResolver::new(&registry).resolve("Order").unwrap();
        let names: Vec<_> = set.names().collect();
        assert_eq!(
            names,
            vec!["id", "created_at", "updated_at", "deleted_at", "customer_id", "approved_by", "total_cents"]
        );
        assert_eq!(set.get("customer_id").unwrap().descriptor.sql_type, "integer");
        assert_eq!(set.get("approved_by").unwrap().descriptor.sql_type, "integer");
        assert_eq!(set.get("id").unwrap().origin, ColumnOrigin::Inherited);
        assert_eq!(set.get("total_cents").unwrap().origin, ColumnOrigin::Declared);
    }

    #[test]
    fn test_unregistered_model_type_is_a_metadata_error() {
        let mut registry = registry();
        registry
            .register(
                ModelDefinition::new("Note")
                    .table("notes")
                    .property(PropertyDefinition::new("author").model("Author").column(ColumnDescriptor::integer())),
            )
            .unwrap();
        let err = ColumnResolver::new(&registry).resolve("Note").unwrap_err();
        assert!(err.is_discovery_error());
    }

    #[test]
    fn test_model_without_columns_is_rejected() {
        let mut registry = ModelRegistry::new();
        registry.register(ModelDefinition::new("Empty").table("empties")).unwrap();
        assert!(ColumnResolver::new(&registry).resolve("Empty").is_err());
        assert!(matches!(
            ColumnResolver::new(&registry).resolve("Missing"),
            Err(OrmError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_parent_link_is_moved_to_the_end() {
        let mut registry = registry();
        registry
            .register(
                ModelDefinition::new("VipCustomer")
                    .extends("Customer")
                    .table_with_parent("vip_customers", "Customer")
                    .column("customer_id", ColumnDescriptor::string())
                    .column("tier", ColumnDescriptor::integer()),
            )
            .unwrap();
        let set = ColumnResolver::new(&registry).resolve("VipCustomer").unwrap();
        let names: Vec<_> = set.names().collect();
        assert_eq!(
            names,
            vec!["id", "created_at", "updated_at", "deleted_at", "tier", "customer_id"]
        );
        let link = set.get("customer_id").unwrap();
        assert_eq!(link.origin, ColumnOrigin::ParentLink);
        assert!(link.descriptor.hidden && link.descriptor.nullable);

        let parent = ColumnResolver::new(&registry).resolve("Customer").unwrap();
        let last = parent.iter().last().unwrap();
        assert_eq!(last.name, "type");
        assert_eq!(last.origin, ColumnOrigin::Discriminator);
    }
}
