//! SQL rendering of migration artifacts
//!
//! Produces the migration file format: header comments, an `-- Up migration`
//! section and a `-- Down migration` section.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OrmError;

use super::definitions::{FieldDefinition, MigrationArtifact, Position, SchemaChange};

/// Placeholder emitted when a down path has no statements
pub const MANUAL_REVERT: &str = "-- Manually revert changes here if necessary.";

/// SQL dialect for DDL generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    #[serde(alias = "postgres")]
    PostgreSQL,
    MySQL,
}

impl SqlDialect {
    /// Quote character for identifiers
    pub fn identifier_quote(self) -> char {
        match self {
            SqlDialect::PostgreSQL => '"',
            SqlDialect::MySQL => '`',
        }
    }

    /// Whether `ALTER TABLE ... ADD COLUMN` accepts `AFTER` / `FIRST`
    pub fn supports_column_position(self) -> bool {
        matches!(self, SqlDialect::MySQL)
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlDialect::PostgreSQL => write!(f, "postgresql"),
            SqlDialect::MySQL => write!(f, "mysql"),
        }
    }
}

impl FromStr for SqlDialect {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pgsql" => Ok(SqlDialect::PostgreSQL),
            "mysql" => Ok(SqlDialect::MySQL),
            other => Err(OrmError::Migration(format!("Unsupported SQL dialect '{}'", other))),
        }
    }
}

/// Renders artifacts into migration SQL for one dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlRenderer {
    dialect: SqlDialect,
}

impl SqlRenderer {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Full migration file content
    pub fn render(&self, artifact: &MigrationArtifact) -> String {
        format!(
            "-- Migration: {} {} table\n\
             -- ID: {}\n\
             -- Model: {}\n\n\
             -- Up migration\n\
             {}\n\n\
             -- Down migration\n\
             {}\n",
            artifact.kind.as_str(),
            artifact.table,
            artifact.id(),
            artifact.model,
            self.up_body(artifact),
            self.down_body(artifact),
        )
    }

    pub fn up_body(&self, artifact: &MigrationArtifact) -> String {
        self.render_changes(&artifact.up).join("\n")
    }

    pub fn down_body(&self, artifact: &MigrationArtifact) -> String {
        if artifact.down.is_empty() {
            return MANUAL_REVERT.to_string();
        }
        self.render_changes(&artifact.down).join("\n")
    }

    /// Render changes into statements (and position comments), in order
    pub fn render_changes(&self, changes: &[SchemaChange]) -> Vec<String> {
        changes
            .iter()
            .flat_map(|change| self.render_change(change))
            .collect()
    }

    fn render_change(&self, change: &SchemaChange) -> Vec<String> {
        match change {
            SchemaChange::CreateTable { table, fields } => {
                let lines: Vec<String> = fields
                    .iter()
                    .flat_map(|field| self.column_lines(field))
                    .map(|line| format!("    {}", line))
                    .collect();
                let mut statements = vec![format!(
                    "CREATE TABLE {} (\n{}\n);",
                    self.quote(table),
                    lines.join(",\n")
                )];
                statements.extend(fields.iter().filter_map(|field| self.index_statement(table, field)));
                statements
            }
            SchemaChange::DropTableIfExists { table } => {
                vec![format!("DROP TABLE IF EXISTS {};", self.quote(table))]
            }
            SchemaChange::AddColumn { table, field, position } => self.add_column(table, field, position),
            SchemaChange::DropColumn { table, column } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {};",
                self.quote(table),
                self.quote(column)
            )],
        }
    }

    fn add_column(&self, table: &str, field: &FieldDefinition, position: &Position) -> Vec<String> {
        let mut statements = Vec::new();
        let mut position = position.clone();

        for (line, name) in self.column_lines(field).into_iter().zip(field.column_names()) {
            if self.dialect.supports_column_position() {
                let placement = match &position {
                    Position::First => "FIRST".to_string(),
                    Position::After(column) => format!("AFTER {}", self.quote(column)),
                };
                statements.push(format!(
                    "ALTER TABLE {} ADD COLUMN {} {};",
                    self.quote(table),
                    line,
                    placement
                ));
            } else {
                let placement = match &position {
                    Position::First => "first".to_string(),
                    Position::After(column) => format!("after {}", column),
                };
                statements.push(format!("-- position: {}", placement));
                statements.push(format!("ALTER TABLE {} ADD COLUMN {};", self.quote(table), line));
            }
            position = Position::After(name.to_string());
        }

        statements.extend(self.index_statement(table, field));
        statements
    }

    fn quote(&self, identifier: &str) -> String {
        let q = self.dialect.identifier_quote();
        format!("{}{}{}", q, identifier, q)
    }

    /// Column definitions of one directive, without the `ADD COLUMN` prefix
    fn column_lines(&self, field: &FieldDefinition) -> Vec<String> {
        match field {
            FieldDefinition::Id => vec![match self.dialect {
                SqlDialect::PostgreSQL => format!("{} BIGSERIAL PRIMARY KEY", self.quote("id")),
                SqlDialect::MySQL => format!("{} BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY", self.quote("id")),
            }],
            FieldDefinition::Timestamps => vec![
                format!("{} TIMESTAMP NULL", self.quote("created_at")),
                format!("{} TIMESTAMP NULL", self.quote("updated_at")),
            ],
            FieldDefinition::SoftDeletes => vec![format!("{} TIMESTAMP NULL", self.quote("deleted_at"))],
            FieldDefinition::RememberToken => {
                vec![format!("{} VARCHAR(100) NULL", self.quote("remember_token"))]
            }
            FieldDefinition::Column {
                name,
                sql_type,
                length,
                nullable,
                default,
                ..
            } => {
                let mut line = format!("{} {}", self.quote(name), self.column_type(sql_type, *length));
                line.push_str(if *nullable { " NULL" } else { " NOT NULL" });
                if let Some(default) = default {
                    line.push_str(&format!(" DEFAULT {}", default.to_sql_literal()));
                }
                vec![line]
            }
        }
    }

    fn index_statement(&self, table: &str, field: &FieldDefinition) -> Option<String> {
        match field {
            FieldDefinition::Column { name, index: true, .. } => Some(format!(
                "CREATE INDEX {} ON {} ({});",
                self.quote(&format!("{}_{}_index", table, name)),
                self.quote(table),
                self.quote(name)
            )),
            _ => None,
        }
    }

    /// Map a schema-builder type tag to a column type; unknown tags pass through
    fn column_type(&self, sql_type: &str, length: Option<u32>) -> String {
        let postgres = self.dialect == SqlDialect::PostgreSQL;
        let pick = |pg: &str, mysql: &str| if postgres { pg.to_string() } else { mysql.to_string() };
        match sql_type {
            "string" => format!("VARCHAR({})", length.unwrap_or(255)),
            "char" => format!("CHAR({})", length.unwrap_or(255)),
            "text" | "longText" | "mediumText" => "TEXT".to_string(),
            "integer" | "unsignedInteger" => pick("INTEGER", "INT"),
            "bigInteger" | "unsignedBigInteger" | "foreignId" => "BIGINT".to_string(),
            "smallInteger" | "tinyInteger" => "SMALLINT".to_string(),
            "boolean" => "BOOLEAN".to_string(),
            "float" | "double" => pick("DOUBLE PRECISION", "DOUBLE"),
            "decimal" => format!("DECIMAL({}, 2)", length.unwrap_or(8)),
            "date" => "DATE".to_string(),
            "dateTime" | "timestamp" => "TIMESTAMP".to_string(),
            "json" => pick("JSONB", "JSON"),
            "uuid" => pick("UUID", "CHAR(36)"),
            other => match length {
                Some(length) => format!("{}({})", other.to_uppercase(), length),
                None => other.to_uppercase(),
            },
        }
    }
}
