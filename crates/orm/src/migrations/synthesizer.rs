//! Migration Synthesizer - diffs effective columns against the live schema
//!
//! Initial migrations create the whole table; incremental ones add missing
//! columns next to their nearest preceding live column and drop columns no
//! longer declared.

use chrono::{DateTime, Utc};

use crate::metadata::ColumnDescriptor;
use crate::naming::{CREATED_AT, DELETED_AT, UPDATED_AT};
use crate::resolver::EffectiveColumnSet;

use super::definitions::{FieldDefinition, MigrationArtifact, MigrationKind, Position, SchemaChange};

/// Source of migration timestamps
pub type Clock = fn() -> DateTime<Utc>;

/// Translate one effective column into its field directive
///
/// Name rules take precedence over the declared type: `deleted_at` is always
/// the soft-delete directive, `created_at` the timestamps pair, and
/// `updated_at` renders nothing since the pair already covers it.
pub fn field_definition(name: &str, column: &ColumnDescriptor) -> Option<FieldDefinition> {
    match name {
        DELETED_AT => return Some(FieldDefinition::SoftDeletes),
        UPDATED_AT => return None,
        CREATED_AT => return Some(FieldDefinition::Timestamps),
        _ => {}
    }

    let field = match column.sql_type.as_str() {
        "id" => FieldDefinition::Id,
        "timestamps" => FieldDefinition::Timestamps,
        "rememberToken" => FieldDefinition::RememberToken,
        sql_type => FieldDefinition::Column {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            length: column.effective_length(),
            nullable: column.nullable,
            default: column.default.clone(),
            index: column.index,
        },
    };
    Some(field)
}

fn timestamp_column(name: &str) -> FieldDefinition {
    FieldDefinition::Column {
        name: name.to_string(),
        sql_type: "timestamp".to_string(),
        length: None,
        nullable: true,
        default: None,
        index: false,
    }
}

/// Columns to add (with placement) and drop for one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDiff {
    pub added: Vec<(String, Position)>,
    pub removed: Vec<String>,
}

impl ColumnDiff {
    /// Compare effective columns with the live column listing
    pub fn compute(columns: &EffectiveColumnSet, live: &[String]) -> Self {
        let names: Vec<&str> = columns.names().collect();
        let is_live = |name: &str| live.iter().any(|existing| existing == name);

        let added = names
            .iter()
            .enumerate()
            .filter(|(_, name)| !is_live(**name))
            .map(|(index, name)| {
                let position = names[..index]
                    .iter()
                    .rev()
                    .find(|preceding| is_live(**preceding))
                    .map(|preceding| Position::After(preceding.to_string()))
                    .unwrap_or(Position::First);
                (name.to_string(), position)
            })
            .collect();

        let removed = live
            .iter()
            .filter(|existing| !columns.contains(existing.as_str()))
            .cloned()
            .collect();

        Self { added, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Builds migration artifacts from effective column sets
#[derive(Debug, Clone, Copy)]
pub struct MigrationSynthesizer {
    clock: Clock,
}

impl Default for MigrationSynthesizer {
    fn default() -> Self {
        Self { clock: Utc::now }
    }
}

impl MigrationSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed or custom timestamp source
    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }

    fn filename(&self, kind: MigrationKind, table: &str) -> String {
        format!(
            "{}_{}_{}_table.sql",
            (self.clock)().format("%Y%m%d%H%M%S"),
            kind.as_str(),
            table
        )
    }

    /// Create-table migration for a table absent from the live schema
    pub fn synthesize_initial(
        &self,
        model: &str,
        table: &str,
        columns: &EffectiveColumnSet,
    ) -> MigrationArtifact {
        let mut fields: Vec<FieldDefinition> = Vec::new();
        for column in columns.iter() {
            if let Some(field) = field_definition(&column.name, &column.descriptor) {
                if field == FieldDefinition::Timestamps && fields.contains(&field) {
                    continue;
                }
                fields.push(field);
            }
        }

        MigrationArtifact {
            filename: self.filename(MigrationKind::Create, table),
            model: model.to_string(),
            table: table.to_string(),
            kind: MigrationKind::Create,
            up: vec![SchemaChange::CreateTable {
                table: table.to_string(),
                fields,
            }],
            down: vec![SchemaChange::DropTableIfExists {
                table: table.to_string(),
            }],
        }
    }

    /// Alter-table migration, or `None` when the live schema already matches
    pub fn synthesize_incremental(
        &self,
        model: &str,
        table: &str,
        columns: &EffectiveColumnSet,
        live: &[String],
    ) -> Option<MigrationArtifact> {
        let diff = ColumnDiff::compute(columns, live);
        if diff.is_empty() {
            return None;
        }

        let is_live = |name: &str| live.iter().any(|existing| existing == name);
        let mut up = Vec::new();
        let mut timestamps_added = false;
        for (name, position) in diff.added {
            let Some(column) = columns.get(&name) else {
                continue;
            };
            // Only the missing half of a half-present timestamps pair is added
            let field = match field_definition(&name, &column.descriptor) {
                Some(FieldDefinition::Timestamps) if is_live(UPDATED_AT) || is_live(CREATED_AT) => {
                    timestamp_column(&name)
                }
                Some(FieldDefinition::Timestamps) if timestamps_added => continue,
                Some(FieldDefinition::Timestamps) => {
                    timestamps_added = true;
                    FieldDefinition::Timestamps
                }
                Some(field) => field,
                None if name == UPDATED_AT && is_live(CREATED_AT) => timestamp_column(&name),
                None => continue,
            };
            up.push(SchemaChange::AddColumn {
                table: table.to_string(),
                field,
                position,
            });
        }

        up.extend(diff.removed.into_iter().map(|column| SchemaChange::DropColumn {
            table: table.to_string(),
            column,
        }));

        if up.is_empty() {
            return None;
        }

        Some(MigrationArtifact {
            filename: self.filename(MigrationKind::Update, table),
            model: model.to_string(),
            table: table.to_string(),
            kind: MigrationKind::Update,
            up,
            down: Vec::new(),
        })
    }
}
