//! Resolved relation definitions
//!
//! A `RelationshipDescriptor` leaves keys optional; a `RelationDefinition`
//! carries the related model and every key with conventions applied.

use serde_json::Value as JsonValue;

use crate::error::{OrmError, OrmResult};
use crate::metadata::{RelationshipDescriptor, RelationshipType};
use crate::model::{ModelCatalog, Record};
use crate::naming::{self, PRIMARY_KEY};
use crate::reflector::RelationshipProperty;

/// Relation kind with its resolved keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// `foreign_key` on the owner references `owner_key` on the related table
    BelongsTo { foreign_key: String, owner_key: String },
    /// `foreign_key` on the related table references `local_key` on the owner
    HasOne { foreign_key: String, local_key: String },
    HasMany { foreign_key: String, local_key: String },
    /// Owner -> through row by `first_key`, through row -> related by `second_key`
    HasOneThrough {
        through: String,
        first_key: String,
        second_key: String,
        local_key: String,
        second_local_key: String,
    },
}

impl RelationKind {
    pub fn relationship_type(&self) -> RelationshipType {
        match self {
            Self::BelongsTo { .. } => RelationshipType::BelongsTo,
            Self::HasOne { .. } => RelationshipType::HasOne,
            Self::HasMany { .. } => RelationshipType::HasMany,
            Self::HasOneThrough { .. } => RelationshipType::HasOneThrough,
        }
    }
}

/// A relation of one model type, ready to be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDefinition {
    /// Declaring property name
    pub name: String,
    /// Alternative name the relation answers to
    pub alias: Option<String>,
    pub related: String,
    pub kind: RelationKind,
    pub eager: bool,
    /// Nested dot-separated paths loaded on the related records
    pub load: Vec<String>,
}

impl RelationDefinition {
    /// Resolve a relationship property declared on (or inherited by) `owner`
    pub fn from_property(owner: &str, property: &RelationshipProperty) -> OrmResult<Self> {
        let declared_model = || {
            property.model.clone().ok_or_else(|| {
                OrmError::metadata(
                    owner,
                    format!("relationship '{}' has no related model type", property.property),
                )
            })
        };

        let (related, alias, kind) = match &property.descriptor {
            RelationshipDescriptor::BelongsTo {
                foreign_key,
                owner_key,
                relation,
                ..
            } => {
                let related = declared_model()?;
                let kind = RelationKind::BelongsTo {
                    foreign_key: foreign_key.clone().unwrap_or_else(|| naming::foreign_key(&related)),
                    owner_key: owner_key.clone().unwrap_or_else(|| PRIMARY_KEY.to_string()),
                };
                (related, relation.clone(), kind)
            }
            RelationshipDescriptor::HasOne {
                foreign_key,
                local_key,
                ..
            } => {
                let kind = RelationKind::HasOne {
                    foreign_key: foreign_key.clone().unwrap_or_else(|| naming::foreign_key(owner)),
                    local_key: local_key.clone().unwrap_or_else(|| PRIMARY_KEY.to_string()),
                };
                (declared_model()?, None, kind)
            }
            RelationshipDescriptor::HasMany {
                related,
                foreign_key,
                local_key,
                ..
            } => {
                let kind = RelationKind::HasMany {
                    foreign_key: foreign_key.clone().unwrap_or_else(|| naming::foreign_key(owner)),
                    local_key: local_key.clone().unwrap_or_else(|| PRIMARY_KEY.to_string()),
                };
                (related.clone(), None, kind)
            }
            RelationshipDescriptor::HasOneThrough {
                through,
                first_key,
                second_key,
                local_key,
                second_local_key,
                ..
            } => {
                let kind = RelationKind::HasOneThrough {
                    through: through.clone(),
                    first_key: first_key.clone().unwrap_or_else(|| naming::foreign_key(owner)),
                    second_key: second_key.clone().unwrap_or_else(|| naming::foreign_key(through)),
                    local_key: local_key.clone().unwrap_or_else(|| PRIMARY_KEY.to_string()),
                    second_local_key: second_local_key
                        .clone()
                        .unwrap_or_else(|| PRIMARY_KEY.to_string()),
                };
                (declared_model()?, None, kind)
            }
        };

        Ok(Self {
            name: property.property.clone(),
            alias,
            related,
            kind,
            eager: property.descriptor.is_eager(),
            load: property.descriptor.load_paths().to_vec(),
        })
    }

    /// Whether the relation answers to `name`
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.alias.as_deref() == Some(name)
    }

    /// Foreign key stored on the owner, for `BelongsTo`
    pub fn owner_foreign_key(&self) -> Option<&str> {
        match &self.kind {
            RelationKind::BelongsTo { foreign_key, .. } => Some(foreign_key),
            _ => None,
        }
    }
}

/// Materialised relation value
#[derive(Debug, Clone)]
pub enum Related {
    One(Option<Box<Record>>),
    Many(Vec<Record>),
}

impl Related {
    pub fn as_one(&self) -> Option<&Record> {
        match self {
            Self::One(record) => record.as_deref(),
            Self::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> &[Record] {
        match self {
            Self::Many(records) => records,
            Self::One(_) => &[],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(record) => usize::from(record.is_some()),
            Self::Many(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn records_mut(&mut self) -> Vec<&mut Record> {
        match self {
            Self::One(Some(record)) => vec![record.as_mut()],
            Self::One(None) => Vec::new(),
            Self::Many(records) => records.iter_mut().collect(),
        }
    }

    pub fn to_json(&self, catalog: &ModelCatalog) -> JsonValue {
        match self {
            Self::One(Some(record)) => record.to_json(catalog),
            Self::One(None) => JsonValue::Null,
            Self::Many(records) => JsonValue::Array(records.iter().map(|r| r.to_json(catalog)).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(name: &str, model: Option<&str>, descriptor: RelationshipDescriptor) -> RelationshipProperty {
        RelationshipProperty {
            property: name.to_string(),
            model: model.map(str::to_string),
            descriptor,
        }
    }

    #[test]
    fn test_belongs_to_defaults_to_related_foreign_key() {
        let relation = RelationDefinition::from_property(
            "Order",
            &property("customer", Some("Customer"), RelationshipDescriptor::belongs_to()),
        )
        .unwrap();
        assert_eq!(relation.related, "Customer");
        assert_eq!(
            relation.kind,
            RelationKind::BelongsTo {
                foreign_key: "customer_id".to_string(),
                owner_key: "id".to_string(),
            }
        );
        assert_eq!(relation.owner_foreign_key(), Some("customer_id"));
    }

    #[test]
    fn test_has_many_and_through_keys_use_owner_and_through() {
        let lines = RelationDefinition::from_property(
            "Order",
            &property("lines", None, RelationshipDescriptor::has_many("OrderLine").with_eager()),
        )
        .unwrap();
        assert!(lines.eager);
        assert_eq!(
            lines.kind,
            RelationKind::HasMany {
                foreign_key: "order_id".to_string(),
                local_key: "id".to_string(),
            }
        );

        let owner = RelationDefinition::from_property(
            "Mechanic",
            &property("carOwner", Some("Owner"), RelationshipDescriptor::has_one_through("Car")),
        )
        .unwrap();
        match owner.kind {
            RelationKind::HasOneThrough {
                first_key,
                second_key,
                ..
            } => {
                assert_eq!(first_key, "mechanic_id");
                assert_eq!(second_key, "car_id");
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_missing_model_type_is_metadata_error() {
        let err = RelationDefinition::from_property(
            "Order",
            &property("customer", None, RelationshipDescriptor::has_one()),
        )
        .unwrap_err();
        assert!(err.is_discovery_error());
    }

    #[test]
    fn test_alias_is_answered() {
        let descriptor = RelationshipDescriptor::BelongsTo {
            foreign_key: None,
            owner_key: None,
            relation: Some("buyer".to_string()),
            eager: false,
            load: Vec::new(),
        };
        let relation =
            RelationDefinition::from_property("Order", &property("customer", Some("Customer"), descriptor)).unwrap();
        assert!(relation.answers_to("buyer"));
        assert!(relation.answers_to("customer"));
        assert!(!relation.answers_to("lines"));
    }
}
