//! # column-orm: column-attribute model layer
//!
//! Models are described once at startup through an explicit registry. From
//! those descriptions the crate derives each model's effective column set,
//! synthesizes create/alter migrations against the live schema, builds the
//! immutable per-type descriptors records carry at runtime, and persists
//! models whose attributes are split between a parent table and their own.
//!
//! Database access goes through the synchronous collaborator traits in
//! `backends`; an in-memory and a PostgreSQL implementation are provided.

pub mod backends;
pub mod error;
pub mod metadata;
pub mod migrations;
pub mod model;
pub mod naming;
pub mod persistence;
pub mod reflector;
pub mod registry;
pub mod relationships;
pub mod resolver;
pub mod transaction;
pub mod validation;
pub mod value;

pub use backends::{Connection, Filter, MemoryDatabase, PostgresConnection, SchemaInspector, TableAccess};
pub use error::{OrmError, OrmResult};
pub use metadata::{
    ColumnDescriptor, ModelDefinition, PropertyDefinition, RelationshipDescriptor, RelationshipType, TableDescriptor,
    ValidationRule,
};
pub use migrations::{AutoMigrator, MigrationArtifact, MigrationOutcome, ModelReport, SqlDialect, SqlRenderer};
pub use model::{ModelCatalog, ModelDescriptor, Record};
pub use persistence::{create, delete, find, get, hydrate, save, select};
pub use reflector::Reflector;
pub use registry::{ModelRegistry, BASE_MODEL};
pub use relationships::{Related, RelationDefinition, RelationKind};
pub use resolver::{ColumnOrigin, ColumnResolver, EffectiveColumnSet, ResolvedColumn};
pub use transaction::transaction;
pub use validation::{ValidationErrors, Validator};
pub use value::{Attributes, Value};
