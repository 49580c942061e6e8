//! Model System
//!
//! - `catalog`: registry, descriptor cache and appended-attribute accessors
//! - `descriptor`: immutable per-type runtime metadata
//! - `record`: model instances with dirty tracking and lazy relation slots

pub mod catalog;
pub mod descriptor;
pub mod record;

pub use catalog::{Accessor, ModelCatalog};
pub use descriptor::ModelDescriptor;
pub use record::Record;
