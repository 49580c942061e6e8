//! Metadata model - typed descriptors for columns, tables, validation rules
//! and relationships. Pure data; behaviour lives in the reflector and resolver.

pub mod column;
pub mod model;
pub mod relationship;
pub mod table;

pub use column::ColumnDescriptor;
pub use model::{ModelDefinition, PropertyDefinition};
pub use relationship::{RelationshipDescriptor, RelationshipType};
pub use table::{TableDescriptor, ValidationRule};
