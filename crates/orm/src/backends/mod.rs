//! Database Backend Abstractions
//!
//! Collaborator traits plus the in-memory and PostgreSQL implementations.

pub mod core;
pub mod memory;
pub mod postgres;

pub use core::{Connection, Filter, SchemaInspector, TableAccess};
pub use memory::{MemoryDatabase, Operation, OperationKind};
pub use postgres::PostgresConnection;
