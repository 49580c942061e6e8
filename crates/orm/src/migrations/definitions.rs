//! Migration Definitions - structured artifacts produced by the synthesizer
//!
//! Artifacts describe schema changes as data; `SqlRenderer` turns them into
//! migration file text for a dialect.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::value::Value;

use super::render::SqlDialect;

/// One field directive of a create or alter migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldDefinition {
    /// Auto-increment integer primary key `id`
    Id,
    /// Conventional `created_at` / `updated_at` pair
    Timestamps,
    /// Soft-delete `deleted_at` timestamp
    SoftDeletes,
    /// Fixed-width nullable `remember_token`
    RememberToken,
    Column {
        name: String,
        sql_type: String,
        length: Option<u32>,
        nullable: bool,
        default: Option<Value>,
        index: bool,
    },
}

impl FieldDefinition {
    /// Column names the directive creates, in order
    pub fn column_names(&self) -> Vec<&str> {
        match self {
            Self::Id => vec!["id"],
            Self::Timestamps => vec!["created_at", "updated_at"],
            Self::SoftDeletes => vec!["deleted_at"],
            Self::RememberToken => vec!["remember_token"],
            Self::Column { name, .. } => vec![name.as_str()],
        }
    }
}

/// Placement of an added column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    First,
    After(String),
}

/// One schema change instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaChange {
    CreateTable {
        table: String,
        fields: Vec<FieldDefinition>,
    },
    DropTableIfExists {
        table: String,
    },
    AddColumn {
        table: String,
        field: FieldDefinition,
        position: Position,
    },
    DropColumn {
        table: String,
        column: String,
    },
}

/// Whether an artifact creates or alters its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationKind {
    Create,
    Update,
}

impl MigrationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

/// One generated migration; immutable once emitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationArtifact {
    /// `YYYYMMDDHHMMSS_{create|update}_<table>_table.sql`
    pub filename: String,
    pub model: String,
    pub table: String,
    pub kind: MigrationKind,
    pub up: Vec<SchemaChange>,
    /// Empty for incremental migrations; reverting them is manual
    pub down: Vec<SchemaChange>,
}

impl MigrationArtifact {
    /// Migration id: the filename without extension
    pub fn id(&self) -> &str {
        self.filename.strip_suffix(".sql").unwrap_or(&self.filename)
    }

    /// Columns added by the up path, in order
    pub fn added_columns(&self) -> Vec<&str> {
        self.up
            .iter()
            .flat_map(|change| match change {
                SchemaChange::AddColumn { field, .. } => field.column_names(),
                SchemaChange::CreateTable { fields, .. } => {
                    fields.iter().flat_map(FieldDefinition::column_names).collect()
                }
                _ => Vec::new(),
            })
            .collect()
    }

    /// Columns dropped by the up path, in order
    pub fn dropped_columns(&self) -> Vec<&str> {
        self.up
            .iter()
            .filter_map(|change| match change {
                SchemaChange::DropColumn { column, .. } => Some(column.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Configuration for migration generation
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    pub dialect: SqlDialect,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            dialect: SqlDialect::default(),
        }
    }
}
