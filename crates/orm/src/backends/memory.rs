//! In-process database backend
//!
//! Tables hold ordered rows with column checking. Transactions snapshot the
//! table set on `begin` and restore it on `rollback`. Every write and
//! transaction step is journaled, and failures can be injected per
//! operation and table.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{OrmError, OrmResult};
use crate::naming::PRIMARY_KEY;
use crate::value::{Attributes, Value};

use super::core::{Connection, Filter, SchemaInspector, TableAccess};

/// Kind of journaled operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Begin,
    Commit,
    Rollback,
    Insert,
    Update,
    Delete,
}

/// One journal entry
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub table: Option<String>,
    pub filter: Option<Filter>,
    pub attributes: Option<Attributes>,
}

impl Operation {
    fn control(kind: OperationKind) -> Self {
        Self {
            kind,
            table: None,
            filter: None,
            attributes: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Attributes>,
    next_id: i64,
}

impl MemoryTable {
    fn check_columns<'a>(&self, table: &str, names: impl IntoIterator<Item = &'a String>) -> OrmResult<()> {
        for name in names {
            if !self.columns.contains(name) {
                return Err(OrmError::database(format!(
                    "Unknown column '{}' in table '{}'",
                    name, table
                )));
            }
        }
        Ok(())
    }

    /// Row padded to the full column list, in table order
    fn project(&self, row: &Attributes) -> Attributes {
        self.columns
            .iter()
            .map(|column| (column.clone(), row.get(column).cloned().unwrap_or(Value::Null)))
            .collect()
    }
}

/// In-memory `Connection` implementation
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: IndexMap<String, MemoryTable>,
    snapshot: Option<IndexMap<String, MemoryTable>>,
    journal: Vec<Operation>,
    failures: Vec<(OperationKind, String)>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a table with the given columns
    pub fn create_table(&mut self, table: &str, columns: &[&str]) -> &mut Self {
        self.tables.insert(
            table.to_string(),
            MemoryTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
                next_id: 1,
            },
        );
        self
    }

    pub fn drop_table(&mut self, table: &str) -> &mut Self {
        self.tables.shift_remove(table);
        self
    }

    /// Rows of a table padded to all columns; empty for unknown tables
    pub fn rows(&self, table: &str) -> Vec<Attributes> {
        self.tables
            .get(table)
            .map(|t| t.rows.iter().map(|row| t.project(row)).collect())
            .unwrap_or_default()
    }

    pub fn journal(&self) -> &[Operation] {
        &self.journal
    }

    /// Journal entries touching one table
    pub fn operations_on(&self, table: &str) -> Vec<&Operation> {
        self.journal
            .iter()
            .filter(|op| op.table.as_deref() == Some(table))
            .collect()
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    /// Make the next `kind` operation on `table` fail
    pub fn fail_on(&mut self, kind: OperationKind, table: &str) -> &mut Self {
        self.failures.push((kind, table.to_string()));
        self
    }

    fn check_failure(&mut self, kind: OperationKind, table: &str) -> OrmResult<()> {
        if let Some(index) = self
            .failures
            .iter()
            .position(|(k, t)| *k == kind && t == table)
        {
            self.failures.remove(index);
            return Err(OrmError::database(format!(
                "Injected {:?} failure on table '{}'",
                kind, table
            )));
        }
        Ok(())
    }

    fn table(&self, table: &str) -> OrmResult<&MemoryTable> {
        self.tables
            .get(table)
            .ok_or_else(|| OrmError::database(format!("Table '{}' does not exist", table)))
    }

    fn table_mut(&mut self, table: &str) -> OrmResult<&mut MemoryTable> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| OrmError::database(format!("Table '{}' does not exist", table)))
    }

    fn record(&mut self, kind: OperationKind, table: &str, filter: Option<&Filter>, attributes: Option<&Attributes>) {
        self.journal.push(Operation {
            kind,
            table: Some(table.to_string()),
            filter: filter.cloned(),
            attributes: attributes.cloned(),
        });
    }

    fn matching(&self, table: &str, filter: &Filter) -> OrmResult<Vec<Attributes>> {
        let t = self.table(table)?;
        t.check_columns(table, filter.conditions().iter().map(|(c, _)| c))?;
        Ok(t.rows
            .iter()
            .map(|row| t.project(row))
            .filter(|row| filter.matches(row))
            .collect())
    }
}

impl SchemaInspector for MemoryDatabase {
    fn table_exists(&self, table: &str) -> OrmResult<bool> {
        Ok(self.tables.contains_key(table))
    }

    fn list_columns(&self, table: &str) -> OrmResult<Vec<String>> {
        Ok(self
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }
}

impl TableAccess for MemoryDatabase {
    fn insert(&mut self, table: &str, attributes: &Attributes) -> OrmResult<()> {
        self.insert_get_id(table, attributes).map(|_| ())
    }

    fn insert_get_id(&mut self, table: &str, attributes: &Attributes) -> OrmResult<i64> {
        self.record(OperationKind::Insert, table, None, Some(attributes));
        self.check_failure(OperationKind::Insert, table)?;

        let t = self.table_mut(table)?;
        t.check_columns(table, attributes.keys())?;

        let mut row = attributes.clone();
        let has_key = t.columns.iter().any(|c| c == PRIMARY_KEY);
        let id = match row.get(PRIMARY_KEY).and_then(Value::as_i64) {
            Some(id) => id,
            None => t.next_id,
        };
        if has_key {
            row.insert(PRIMARY_KEY.to_string(), Value::Integer(id));
            t.next_id = t.next_id.max(id + 1);
        }
        t.rows.push(row);

        debug!("Inserted row into '{}' with id {}", table, id);
        Ok(id)
    }

    fn update(&mut self, table: &str, filter: &Filter, attributes: &Attributes) -> OrmResult<u64> {
        self.record(OperationKind::Update, table, Some(filter), Some(attributes));
        self.check_failure(OperationKind::Update, table)?;

        let t = self.table_mut(table)?;
        t.check_columns(table, attributes.keys())?;
        t.check_columns(table, filter.conditions().iter().map(|(c, _)| c))?;

        let mut affected = 0;
        for index in 0..t.rows.len() {
            if filter.matches(&t.project(&t.rows[index])) {
                for (column, value) in attributes {
                    t.rows[index].insert(column.clone(), value.clone());
                }
                affected += 1;
            }
        }
        Ok(affected)
    }

    fn delete(&mut self, table: &str, filter: &Filter) -> OrmResult<u64> {
        self.record(OperationKind::Delete, table, Some(filter), None);
        self.check_failure(OperationKind::Delete, table)?;

        let t = self.table_mut(table)?;
        t.check_columns(table, filter.conditions().iter().map(|(c, _)| c))?;

        let before = t.rows.len();
        let columns = t.columns.clone();
        t.rows.retain(|row| {
            let projected: Attributes = columns
                .iter()
                .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                .collect();
            !filter.matches(&projected)
        });
        Ok((before - t.rows.len()) as u64)
    }

    fn exists(&mut self, table: &str, filter: &Filter) -> OrmResult<bool> {
        Ok(!self.matching(table, filter)?.is_empty())
    }

    fn first(&mut self, table: &str, filter: &Filter) -> OrmResult<Option<Attributes>> {
        Ok(self.matching(table, filter)?.into_iter().next())
    }

    fn select(&mut self, table: &str, filter: &Filter) -> OrmResult<Vec<Attributes>> {
        self.matching(table, filter)
    }
}

impl Connection for MemoryDatabase {
    fn begin(&mut self) -> OrmResult<()> {
        if self.snapshot.is_some() {
            return Err(OrmError::Transaction("Transaction already active".to_string()));
        }
        self.journal.push(Operation::control(OperationKind::Begin));
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> OrmResult<()> {
        if self.snapshot.take().is_none() {
            return Err(OrmError::Transaction("No active transaction to commit".to_string()));
        }
        self.journal.push(Operation::control(OperationKind::Commit));
        Ok(())
    }

    fn rollback(&mut self) -> OrmResult<()> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| OrmError::Transaction("No active transaction to roll back".to_string()))?;
        self.tables = snapshot;
        self.journal.push(Operation::control(OperationKind::Rollback));
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }
}
