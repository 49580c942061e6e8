//! Model instances

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::backends::Connection;
use crate::error::{OrmError, OrmResult};
use crate::naming::PRIMARY_KEY;
use crate::relationships::{load_relation, Related};
use crate::value::{Attributes, Value};

use super::catalog::ModelCatalog;
use super::descriptor::ModelDescriptor;

/// One instance of a model type
///
/// Holds the attribute map with its original snapshot for dirty tracking,
/// and one cache slot per declared relation. The parent link is the
/// parent-table key of a child-role record and is never part of the
/// attributes.
#[derive(Debug, Clone)]
pub struct Record {
    pub(crate) descriptor: Arc<ModelDescriptor>,
    pub(crate) attributes: Attributes,
    pub(crate) original: Attributes,
    pub(crate) exists: bool,
    pub(crate) parent_link: Option<Value>,
    relations: IndexMap<String, Option<Related>>,
}

impl Record {
    pub fn new(descriptor: Arc<ModelDescriptor>) -> Self {
        let relations = descriptor
            .relations
            .keys()
            .map(|name| (name.clone(), None))
            .collect();
        Self {
            descriptor,
            attributes: Attributes::new(),
            original: Attributes::new(),
            exists: false,
            parent_link: None,
            relations,
        }
    }

    pub fn model(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &Arc<ModelDescriptor> {
        &self.descriptor
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Mass-assign attributes; keys outside the fillable list are discarded
    pub fn fill(&mut self, attributes: Attributes) -> &mut Self {
        for (name, value) in attributes {
            if self.descriptor.is_fillable(&name) {
                self.attributes.insert(name, value);
            } else {
                debug!("Discarding non-fillable attribute '{}' on {}", name, self.model());
            }
        }
        self
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Primary key of the record's own table
    pub fn key(&self) -> Option<&Value> {
        self.attributes.get(PRIMARY_KEY).filter(|value| !value.is_null())
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Parent-table key of a child-role record
    pub fn parent_link(&self) -> Option<&Value> {
        self.parent_link.as_ref()
    }

    /// Attributes changed since the last sync, in attribute order
    pub fn dirty(&self) -> Attributes {
        self.attributes
            .iter()
            .filter(|(name, value)| self.original.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.attributes
            .iter()
            .any(|(name, value)| self.original.get(name) != Some(value))
    }

    pub fn sync_original(&mut self) {
        self.original = self.attributes.clone();
    }

    /// Load a relation unless its slot is already filled
    pub fn load(&mut self, catalog: &ModelCatalog, conn: &mut dyn Connection, name: &str) -> OrmResult<()> {
        let descriptor = Arc::clone(&self.descriptor);
        let relation = descriptor.relation(name).ok_or_else(|| {
            OrmError::Relationship(format!("Model '{}' has no relation '{}'", self.model(), name))
        })?;
        if self.relation_loaded(&relation.name) {
            return Ok(());
        }

        let related = load_relation(catalog, conn, self, relation)?;
        self.relations.insert(relation.name.clone(), Some(related));
        Ok(())
    }

    /// Lazy relation accessor: materialised on first call, cached afterwards
    pub fn relation(&mut self, catalog: &ModelCatalog, conn: &mut dyn Connection, name: &str) -> OrmResult<&Related> {
        self.load(catalog, conn, name)?;
        let slot = self
            .descriptor
            .relation(name)
            .map(|relation| relation.name.clone())
            .unwrap_or_else(|| name.to_string());
        self.relations
            .get(&slot)
            .and_then(Option::as_ref)
            .ok_or_else(|| OrmError::Relationship(format!("Relation '{}' failed to load", name)))
    }

    /// Already-loaded relation value, without touching the database
    pub fn loaded_relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name).and_then(Option::as_ref)
    }

    pub(crate) fn loaded_relation_mut(&mut self, name: &str) -> Option<&mut Related> {
        let slot = self.descriptor.relation(name).map(|r| r.name.clone())?;
        self.relations.get_mut(&slot).and_then(Option::as_mut)
    }

    pub fn relation_loaded(&self, name: &str) -> bool {
        self.loaded_relation(name).is_some()
    }

    /// Fill a relation slot directly
    pub fn set_relation(&mut self, name: &str, related: Related) -> OrmResult<()> {
        match self.relations.get_mut(name) {
            Some(slot) => {
                *slot = Some(related);
                Ok(())
            }
            None => Err(OrmError::Relationship(format!(
                "Model '{}' has no relation '{}'",
                self.model(),
                name
            ))),
        }
    }

    /// Serialized form: visible attributes, appended attributes, loaded relations
    pub fn to_json(&self, catalog: &ModelCatalog) -> JsonValue {
        let mut map = Map::new();

        for (name, value) in &self.attributes {
            if !self.descriptor.is_hidden(name) {
                map.insert(name.clone(), value.to_json());
            }
        }

        for name in &self.descriptor.appends {
            let value = catalog
                .accessor(self.model(), name)
                .map(|accessor| accessor(self))
                .unwrap_or(Value::Null);
            map.insert(name.clone(), value.to_json());
        }

        for (name, slot) in &self.relations {
            if let Some(related) = slot {
                map.insert(name.clone(), related.to_json(catalog));
            }
        }

        JsonValue::Object(map)
    }
}
