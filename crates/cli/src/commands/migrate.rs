use anyhow::{bail, Context, Result};
use column_orm::migrations::{
    AutoMigrator, FileMigrationStore, MemoryMigrationStore, MigrationOutcome, MigrationStore, ModelReport,
    SqlDialect, SqlRenderer,
};
use column_orm::{ModelRegistry, PostgresConnection, SchemaInspector};
use console::style;

use crate::config::Config;

/// Generate a migration for every concrete model whose table differs from the database
pub fn auto_create(config: &Config, registry: &ModelRegistry, dry_run: bool) -> Result<()> {
    ensure_inspectable(config)?;
    let url = config.database_url()?;
    let connection = PostgresConnection::connect(url).context("Failed to connect to the database")?;
    tracing::info!(dialect = %config.dialect, dir = %config.migrations_dir.display(), "auto-creating migrations");

    let renderer = SqlRenderer::new(config.dialect);
    if dry_run {
        let mut store = MemoryMigrationStore::new();
        let result = run_with(registry, renderer, &connection, &mut store);
        print_pending(&store)?;
        result.map(|_| ())
    } else {
        let mut store = FileMigrationStore::new(&config.migrations_dir);
        run_with(registry, renderer, &connection, &mut store).map(|_| ())
    }
}

/// The live schema is read through PostgreSQL only
fn ensure_inspectable(config: &Config) -> Result<()> {
    if config.dialect != SqlDialect::PostgreSQL {
        bail!(
            "Live schema inspection is only available for PostgreSQL; dialect '{}' cannot be auto-created",
            config.dialect
        );
    }
    Ok(())
}

/// Run the migrator against any inspector and store, then print the reports
pub fn run_with(
    registry: &ModelRegistry,
    renderer: SqlRenderer,
    inspector: &dyn SchemaInspector,
    store: &mut dyn MigrationStore,
) -> Result<Vec<ModelReport>> {
    let reports = AutoMigrator::new(registry).with_renderer(renderer).run(inspector, store);
    summarize(&reports)?;
    Ok(reports)
}

fn print_pending(store: &MemoryMigrationStore) -> Result<()> {
    for filename in store.list()? {
        println!("{} {}", style("--").dim(), style(&filename).bold());
        if let Some(content) = store.get(&filename) {
            println!("{}", content);
        }
    }
    Ok(())
}

fn summarize(reports: &[ModelReport]) -> Result<()> {
    let mut failed = 0;
    for report in reports {
        let line = report.to_string();
        match &report.outcome {
            MigrationOutcome::Created { .. } | MigrationOutcome::Updated { .. } => {
                println!("{} {}", style("✓").green(), line)
            }
            MigrationOutcome::NoChanges => println!("{} {}", style("·").dim(), line),
            MigrationOutcome::Skipped { .. } => println!("{} {}", style("-").yellow(), line),
            MigrationOutcome::Failed { .. } => {
                failed += 1;
                eprintln!("{} {}", style("✗").red(), line)
            }
        }
    }

    if failed > 0 {
        bail!("{} model(s) failed to migrate", failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use column_orm::MemoryDatabase;

    use crate::models_file;

    const MODELS: &str = r#"
[[model]]
name = "Tag"
extends = "Model"
table = { table = "tags" }

[[model.properties]]
name = "label"
column = { type = "string" }
"#;

    #[test]
    fn test_run_with_writes_one_file_per_changed_model() {
        let registry = models_file::parse(MODELS).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileMigrationStore::new(dir.path());
        let db = MemoryDatabase::new();

        let reports = run_with(&registry, SqlRenderer::new(SqlDialect::MySQL), &db, &mut store).unwrap();
        assert_eq!(reports.len(), 1);
        let filename = reports[0].outcome.filename().unwrap().to_string();
        assert!(filename.ends_with("_create_tags_table.sql"));

        let content = std::fs::read_to_string(dir.path().join(&filename)).unwrap();
        assert!(content.contains("CREATE TABLE `tags`"));
    }

    #[test]
    fn test_mysql_dialect_is_rejected_before_connecting() {
        let config = Config {
            database_url: Some("postgres://localhost/app".to_string()),
            dialect: SqlDialect::MySQL,
            ..Config::default()
        };
        let registry = models_file::parse(MODELS).unwrap();
        let err = auto_create(&config, &registry, true).unwrap_err();
        assert!(err.to_string().contains("only available for PostgreSQL"));
    }

    #[test]
    fn test_failed_model_fails_the_command() {
        let reports = vec![ModelReport {
            model: "Tag".to_string(),
            table: Some("tags".to_string()),
            outcome: MigrationOutcome::Failed {
                error: "boom".to_string(),
            },
        }];
        assert!(summarize(&reports).is_err());
    }
}
