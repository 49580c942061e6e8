//! Core collaborator traits
//!
//! The ORM never opens connections itself: schema inspection, row access and
//! transaction control are delegated to these synchronous traits.

use std::fmt;

use crate::error::OrmResult;
use crate::value::{Attributes, Value};

/// Conjunction of column equality conditions; a `Null` value matches `IS NULL`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate against a row; an absent column counts as `Null`
    pub fn matches(&self, row: &Attributes) -> bool {
        self.conditions.iter().all(|(column, expected)| {
            let actual = row.get(column).unwrap_or(&Value::Null);
            match expected {
                Value::Null => actual.is_null(),
                expected => actual == expected,
            }
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return write!(f, "true");
        }
        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|(column, value)| match value {
                Value::Null => format!("{} IS NULL", column),
                value => format!("{} = {}", column, value),
            })
            .collect();
        write!(f, "{}", parts.join(" AND "))
    }
}

/// Read-only view of the live database schema
pub trait SchemaInspector {
    fn table_exists(&self, table: &str) -> OrmResult<bool>;

    /// Existing column names in table order
    fn list_columns(&self, table: &str) -> OrmResult<Vec<String>>;
}

/// Row-level table access, participating in the caller's transaction
pub trait TableAccess {
    fn insert(&mut self, table: &str, attributes: &Attributes) -> OrmResult<()>;

    /// Insert a row and return its generated `id`
    fn insert_get_id(&mut self, table: &str, attributes: &Attributes) -> OrmResult<i64>;

    /// Update matching rows, returning the affected count
    fn update(&mut self, table: &str, filter: &Filter, attributes: &Attributes) -> OrmResult<u64>;

    /// Delete matching rows, returning the affected count
    fn delete(&mut self, table: &str, filter: &Filter) -> OrmResult<u64>;

    fn exists(&mut self, table: &str, filter: &Filter) -> OrmResult<bool>;

    fn first(&mut self, table: &str, filter: &Filter) -> OrmResult<Option<Attributes>>;

    fn select(&mut self, table: &str, filter: &Filter) -> OrmResult<Vec<Attributes>>;
}

/// Full database collaborator with transaction control
pub trait Connection: SchemaInspector + TableAccess {
    fn begin(&mut self) -> OrmResult<()>;

    fn commit(&mut self) -> OrmResult<()>;

    fn rollback(&mut self) -> OrmResult<()>;

    fn in_transaction(&self) -> bool;
}
