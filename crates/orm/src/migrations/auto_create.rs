//! Batch migration generation over every registered concrete model
//!
//! Each model gets at most one artifact per run. A failing model is reported
//! and the batch moves on to the next one.

use std::fmt;

use tracing::{error, info, warn};

use crate::backends::SchemaInspector;
use crate::error::OrmResult;
use crate::reflector::Reflector;
use crate::registry::ModelRegistry;
use crate::resolver::ColumnResolver;

use super::definitions::{MigrationArtifact, MigrationKind};
use super::render::SqlRenderer;
use super::store::MigrationStore;
use super::synthesizer::MigrationSynthesizer;

/// Result of processing one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    Created { filename: String },
    Updated { filename: String },
    NoChanges,
    Skipped { reason: String },
    Failed { error: String },
}

impl MigrationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Filename of the emitted artifact, if any
    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Created { filename } | Self::Updated { filename } => Some(filename),
            _ => None,
        }
    }
}

/// Per-model diagnostic of a batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReport {
    pub model: String,
    pub table: Option<String>,
    pub outcome: MigrationOutcome,
}

impl fmt::Display for ModelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.as_deref().unwrap_or("-");
        match &self.outcome {
            MigrationOutcome::Created { filename } => write!(f, "Created migration: {}", filename),
            MigrationOutcome::Updated { filename } => write!(f, "Created migration: {}", filename),
            MigrationOutcome::NoChanges => write!(f, "No changes detected for table [{}].", table),
            MigrationOutcome::Skipped { reason } => write!(f, "Skipped model {}: {}", self.model, reason),
            MigrationOutcome::Failed { error } => write!(f, "Failed model {}: {}", self.model, error),
        }
    }
}

/// Decides create-vs-alter per model and writes the resulting artifacts
#[derive(Debug, Clone, Copy)]
pub struct AutoMigrator<'a> {
    registry: &'a ModelRegistry,
    synthesizer: MigrationSynthesizer,
    renderer: SqlRenderer,
}

impl<'a> AutoMigrator<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self {
            registry,
            synthesizer: MigrationSynthesizer::default(),
            renderer: SqlRenderer::default(),
        }
    }

    pub fn with_synthesizer(mut self, synthesizer: MigrationSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn with_renderer(mut self, renderer: SqlRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Artifact the model needs against the live schema, if any
    pub fn plan(&self, model: &str, inspector: &dyn SchemaInspector) -> OrmResult<Option<MigrationArtifact>> {
        let table = Reflector::new(self.registry).describe_table(model).table;
        let columns = ColumnResolver::new(self.registry).resolve(model)?;

        if !inspector.table_exists(&table)? {
            return Ok(Some(self.synthesizer.synthesize_initial(model, &table, &columns)));
        }

        let live = inspector.list_columns(&table)?;
        Ok(self
            .synthesizer
            .synthesize_incremental(model, &table, &columns, &live))
    }

    /// Process every concrete registered model
    pub fn run(&self, inspector: &dyn SchemaInspector, store: &mut dyn MigrationStore) -> Vec<ModelReport> {
        let reflector = Reflector::new(self.registry);

        self.registry
            .concrete_models()
            .map(|definition| {
                let model = definition.name.as_str();
                if !reflector.has_table_attribute(model) {
                    warn!("Model {} has no table mapping, skipping", model);
                    return ModelReport {
                        model: model.to_string(),
                        table: None,
                        outcome: MigrationOutcome::Skipped {
                            reason: "no table mapping declared".to_string(),
                        },
                    };
                }

                let table = reflector.describe_table(model).table;
                let outcome = match self.process(model, inspector, store) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        error!("Failed to generate migration for {}: {}", model, err);
                        MigrationOutcome::Failed {
                            error: err.to_string(),
                        }
                    }
                };

                ModelReport {
                    model: model.to_string(),
                    table: Some(table),
                    outcome,
                }
            })
            .collect()
    }

    fn process(
        &self,
        model: &str,
        inspector: &dyn SchemaInspector,
        store: &mut dyn MigrationStore,
    ) -> OrmResult<MigrationOutcome> {
        let Some(artifact) = self.plan(model, inspector)? else {
            info!("No changes detected for model {}", model);
            return Ok(MigrationOutcome::NoChanges);
        };

        store.write(&artifact.filename, &self.renderer.render(&artifact))?;
        info!("Created migration: {}", artifact.filename);

        let filename = artifact.filename;
        Ok(match artifact.kind {
            MigrationKind::Create => MigrationOutcome::Created { filename },
            MigrationKind::Update => MigrationOutcome::Updated { filename },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryDatabase;
    use crate::metadata::{ColumnDescriptor, ModelDefinition, PropertyDefinition};
    use crate::migrations::store::MemoryMigrationStore;
    use crate::registry::BASE_MODEL;
    use chrono::{DateTime, TimeZone, Utc};

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::with_base();
        registry
            .register(
                ModelDefinition::new("Post")
                    .extends(BASE_MODEL)
                    .table("posts")
                    .column("title", ColumnDescriptor::string()),
            )
            .unwrap();
        registry
            .register(
                ModelDefinition::new("Comment")
                    .extends(BASE_MODEL)
                    .table("comments")
                    .property(PropertyDefinition::new("author").model("Author").column(ColumnDescriptor::integer())),
            )
            .unwrap();
        registry
            .register(
                ModelDefinition::new("Draft")
                    .extends(BASE_MODEL)
                    .column("body", ColumnDescriptor::string()),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_batch_reports_each_model_and_continues_after_failure() {
        let registry = registry();
        let db = MemoryDatabase::new();
        let mut store = MemoryMigrationStore::new();

        let reports = AutoMigrator::new(&registry)
            .with_synthesizer(MigrationSynthesizer::with_clock(fixed_clock))
            .run(&db, &mut store);

        assert_eq!(reports.len(), 3);
        assert_eq!(
            reports[0].outcome,
            MigrationOutcome::Created {
                filename: "20240501080000_create_posts_table.sql".to_string()
            }
        );
        assert!(reports[1].outcome.is_failure());
        assert!(matches!(reports[2].outcome, MigrationOutcome::Skipped { .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_existing_table_yields_update_or_no_changes() {
        let registry = registry();
        let mut db = MemoryDatabase::new();
        db.create_table("posts", &["id", "created_at", "updated_at", "deleted_at", "title"]);
        let migrator = AutoMigrator::new(&registry).with_synthesizer(MigrationSynthesizer::with_clock(fixed_clock));

        assert!(migrator.plan("Post", &db).unwrap().is_none());

        db.create_table("posts", &["id", "title", "legacy"]);
        let artifact = migrator.plan("Post", &db).unwrap().unwrap();
        assert_eq!(artifact.kind, MigrationKind::Update);
        assert_eq!(artifact.dropped_columns(), vec!["legacy"]);
        assert_eq!(artifact.added_columns(), vec!["created_at", "updated_at", "deleted_at"]);
    }
}
