//! Relationships
//!
//! Resolved relation definitions per model type and lazy loading of their
//! values onto records.

pub mod definition;
pub mod loader;

pub use definition::{Related, RelationDefinition, RelationKind};
pub use loader::{load_path, load_relation};
