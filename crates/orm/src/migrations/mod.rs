//! Migration System
//!
//! Synthesizes create/alter migrations by diffing effective column sets
//! against the live schema, renders them to SQL and writes them to an
//! append-only store.

pub mod auto_create;
pub mod definitions;
pub mod render;
pub mod store;
pub mod synthesizer;

pub use auto_create::{AutoMigrator, MigrationOutcome, ModelReport};
pub use definitions::{FieldDefinition, MigrationArtifact, MigrationConfig, MigrationKind, Position, SchemaChange};
pub use render::{SqlDialect, SqlRenderer, MANUAL_REVERT};
pub use store::{FileMigrationStore, MemoryMigrationStore, MigrationStore};
pub use synthesizer::{field_definition, Clock, ColumnDiff, MigrationSynthesizer};
