//! PostgreSQL Backend
//!
//! `sqlx` pool driven from a current-thread tokio runtime, so callers see
//! the same blocking collaborator traits as the in-memory backend.

use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row, Transaction, TypeInfo, ValueRef};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::error::{OrmError, OrmResult};
use crate::naming::PRIMARY_KEY;
use crate::value::{Attributes, Value};

use super::core::{Connection, Filter, SchemaInspector, TableAccess};

/// Blocking PostgreSQL connection
pub struct PostgresConnection {
    runtime: Runtime,
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl std::fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("in_transaction", &self.tx.is_some())
            .finish()
    }
}

impl PostgresConnection {
    /// Connect to the database at `url`
    pub fn connect(url: &str) -> OrmResult<Self> {
        Self::connect_with(url, 5)
    }

    pub fn connect_with(url: &str, max_connections: u32) -> OrmResult<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let pool = runtime.block_on(
            PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(url),
        )?;
        debug!("Connected PostgreSQL pool with {} max connections", max_connections);
        Ok(Self {
            runtime,
            pool,
            tx: None,
        })
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        debug!("Executing: {}", sql);
        let query = bind_all(sqlx::query(sql), params);
        let result = match self.tx.as_mut() {
            Some(tx) => self.runtime.block_on(query.execute(&mut **tx))?,
            None => self.runtime.block_on(query.execute(&self.pool))?,
        };
        Ok(result.rows_affected())
    }

    fn fetch_all(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<PgRow>> {
        debug!("Fetching: {}", sql);
        let query = bind_all(sqlx::query(sql), params);
        let rows = match self.tx.as_mut() {
            Some(tx) => self.runtime.block_on(query.fetch_all(&mut **tx))?,
            None => self.runtime.block_on(query.fetch_all(&self.pool))?,
        };
        Ok(rows)
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// `WHERE` clause for a filter, pushing bound values onto `params`
fn where_clause(filter: &Filter, params: &mut Vec<Value>) -> String {
    if filter.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = filter
        .conditions()
        .iter()
        .map(|(column, value)| match value {
            Value::Null => format!("{} IS NULL", quote(column)),
            value => {
                params.push(value.clone());
                format!("{} = ${}", quote(column), params.len())
            }
        })
        .collect();
    format!(" WHERE {}", parts.join(" AND "))
}

fn insert_sql(table: &str, attributes: &Attributes) -> (String, Vec<Value>) {
    if attributes.is_empty() {
        return (format!("INSERT INTO {} DEFAULT VALUES", quote(table)), Vec::new());
    }
    let mut params: Vec<Value> = Vec::new();
    let columns: Vec<String> = attributes.keys().map(|c| quote(c)).collect();
    let placeholders: Vec<String> = attributes.values().map(|value| placeholder(value, &mut params)).collect();
    (
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(table),
            columns.join(", "),
            placeholders.join(", ")
        ),
        params,
    )
}

/// Next `$n` placeholder for a bound value
///
/// NULL is written inline: a typed null parameter is rejected by columns of
/// any other type.
fn placeholder(value: &Value, params: &mut Vec<Value>) -> String {
    if value.is_null() {
        return "NULL".to_string();
    }
    params.push(value.clone());
    format!("${}", params.len())
}

fn update_sql(table: &str, filter: &Filter, attributes: &Attributes) -> (String, Vec<Value>) {
    let mut params: Vec<Value> = Vec::new();
    let assignments: Vec<String> = attributes
        .iter()
        .map(|(column, value)| format!("{} = {}", quote(column), placeholder(value, &mut params)))
        .collect();
    let clause = where_clause(filter, &mut params);
    (
        format!("UPDATE {} SET {}{}", quote(table), assignments.join(", "), clause),
        params,
    )
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[Value],
) -> Query<'q, Postgres, PgArguments> {
    for value in params {
        query = bind_value(query, value);
    }
    query
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Integer(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Timestamp(ts) => query.bind(*ts),
        Value::Json(j) => query.bind(j.clone()),
    }
}

/// Decode a row into attributes, keyed by column name in select order
fn decode_row(row: &PgRow) -> OrmResult<Attributes> {
    let mut attributes = Attributes::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = decode_value(row, index, column.type_info().name())?;
        attributes.insert(column.name().to_string(), value);
    }
    Ok(attributes)
}

fn decode_value(row: &PgRow, index: usize, type_name: &str) -> OrmResult<Value> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOL" => Value::Bool(row.try_get(index)?),
        "INT2" => Value::Integer(row.try_get::<i16, _>(index)? as i64),
        "INT4" => Value::Integer(row.try_get::<i32, _>(index)? as i64),
        "INT8" => Value::Integer(row.try_get(index)?),
        "FLOAT4" => Value::Float(row.try_get::<f32, _>(index)? as f64),
        "FLOAT8" => Value::Float(row.try_get(index)?),
        "TIMESTAMPTZ" => Value::Timestamp(row.try_get(index)?),
        "TIMESTAMP" => {
            let naive: chrono::NaiveDateTime = row.try_get(index)?;
            Value::Timestamp(naive.and_utc())
        }
        "DATE" => {
            let date: chrono::NaiveDate = row.try_get(index)?;
            Value::String(date.to_string())
        }
        "JSON" | "JSONB" => Value::Json(row.try_get(index)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::String(row.try_get(index)?),
        other => row.try_get::<String, _>(index).map(Value::String).map_err(|e| {
            OrmError::database(format!("Unsupported column type {}: {}", other, e))
        })?,
    };
    Ok(value)
}

impl SchemaInspector for PostgresConnection {
    fn table_exists(&self, table: &str) -> OrmResult<bool> {
        let exists: bool = self.runtime.block_on(
            sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1)",
            )
            .bind(table)
            .fetch_one(&self.pool),
        )?;
        Ok(exists)
    }

    fn list_columns(&self, table: &str) -> OrmResult<Vec<String>> {
        let columns: Vec<String> = self.runtime.block_on(
            sqlx::query_scalar(
                "SELECT column_name::text FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1 \
                 ORDER BY ordinal_position",
            )
            .bind(table)
            .fetch_all(&self.pool),
        )?;
        Ok(columns)
    }
}

impl TableAccess for PostgresConnection {
    fn insert(&mut self, table: &str, attributes: &Attributes) -> OrmResult<()> {
        let (sql, params) = insert_sql(table, attributes);
        self.execute(&sql, &params).map(|_| ())
    }

    fn insert_get_id(&mut self, table: &str, attributes: &Attributes) -> OrmResult<i64> {
        let (sql, params) = insert_sql(table, attributes);
        let sql = format!("{} RETURNING {}", sql, quote(PRIMARY_KEY));
        let rows = self.fetch_all(&sql, &params)?;
        let row = rows
            .first()
            .ok_or_else(|| OrmError::database(format!("Insert into '{}' returned no id", table)))?;
        match decode_value(row, 0, row.columns()[0].type_info().name())? {
            Value::Integer(id) => Ok(id),
            other => Err(OrmError::database(format!(
                "Insert into '{}' returned a non-integer id: {}",
                table, other
            ))),
        }
    }

    fn update(&mut self, table: &str, filter: &Filter, attributes: &Attributes) -> OrmResult<u64> {
        if attributes.is_empty() {
            return Ok(0);
        }
        let (sql, params) = update_sql(table, filter, attributes);
        self.execute(&sql, &params)
    }

    fn delete(&mut self, table: &str, filter: &Filter) -> OrmResult<u64> {
        let mut params = Vec::new();
        let clause = where_clause(filter, &mut params);
        self.execute(&format!("DELETE FROM {}{}", quote(table), clause), &params)
    }

    fn exists(&mut self, table: &str, filter: &Filter) -> OrmResult<bool> {
        Ok(self.first(table, filter)?.is_some())
    }

    fn first(&mut self, table: &str, filter: &Filter) -> OrmResult<Option<Attributes>> {
        let mut params = Vec::new();
        let clause = where_clause(filter, &mut params);
        let sql = format!("SELECT * FROM {}{} LIMIT 1", quote(table), clause);
        self.fetch_all(&sql, &params)?
            .first()
            .map(decode_row)
            .transpose()
    }

    fn select(&mut self, table: &str, filter: &Filter) -> OrmResult<Vec<Attributes>> {
        let mut params = Vec::new();
        let clause = where_clause(filter, &mut params);
        let sql = format!("SELECT * FROM {}{}", quote(table), clause);
        self.fetch_all(&sql, &params)?.iter().map(decode_row).collect()
    }
}

impl Connection for PostgresConnection {
    fn begin(&mut self) -> OrmResult<()> {
        if self.tx.is_some() {
            return Err(OrmError::Transaction("Transaction already active".to_string()));
        }
        let tx = self
            .runtime
            .block_on(self.pool.begin())
            .map_err(|e| OrmError::Transaction(format!("Failed to begin transaction: {}", e)))?;
        self.tx = Some(tx);
        Ok(())
    }

    fn commit(&mut self) -> OrmResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| OrmError::Transaction("No active transaction to commit".to_string()))?;
        self.runtime
            .block_on(tx.commit())
            .map_err(|e| OrmError::Transaction(format!("Failed to commit transaction: {}", e)))
    }

    fn rollback(&mut self) -> OrmResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| OrmError::Transaction("No active transaction to roll back".to_string()))?;
        self.runtime
            .block_on(tx.rollback())
            .map_err(|e| OrmError::Transaction(format!("Failed to rollback transaction: {}", e)))
    }

    fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes;

    #[test]
    fn test_insert_sql_numbers_placeholders() {
        let (sql, params) = insert_sql("cars", &attributes! { "doors" => 4, "vehicle_id" => 9 });
        assert_eq!(sql, "INSERT INTO \"cars\" (\"doors\", \"vehicle_id\") VALUES ($1, $2)");
        assert_eq!(params, vec![Value::Integer(4), Value::Integer(9)]);
        assert_eq!(insert_sql("cars", &Attributes::new()).0, "INSERT INTO \"cars\" DEFAULT VALUES");
    }

    #[test]
    fn test_update_sql_continues_numbering_into_where() {
        let filter = Filter::new().eq("vehicle_id", 9).eq("deleted_at", Value::Null);
        let (sql, params) = update_sql("cars", &filter, &attributes! { "doors" => 2 });
        assert_eq!(
            sql,
            "UPDATE \"cars\" SET \"doors\" = $1 WHERE \"vehicle_id\" = $2 AND \"deleted_at\" IS NULL"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_null_values_are_written_inline() {
        let (sql, params) = insert_sql("cars", &attributes! { "owner_id" => Value::Null, "doors" => 4 });
        assert_eq!(sql, "INSERT INTO \"cars\" (\"owner_id\", \"doors\") VALUES (NULL, $1)");
        assert_eq!(params, vec![Value::Integer(4)]);

        let filter = Filter::new().eq("id", 3);
        let (sql, params) = update_sql("cars", &filter, &attributes! { "owner_id" => Value::Null });
        assert_eq!(sql, "UPDATE \"cars\" SET \"owner_id\" = NULL WHERE \"id\" = $1");
        assert_eq!(params, vec![Value::Integer(3)]);
    }

    #[test]
    fn test_quote_escapes_identifiers() {
        assert_eq!(quote("odd\"name"), "\"odd\"\"name\"");
    }
}
