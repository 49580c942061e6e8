mod commands;
mod config;
mod models_file;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use column_orm::SqlDialect;
use tracing_subscriber::EnvFilter;

use config::{Config, Overrides};

#[derive(Parser)]
#[command(name = "column-orm")]
#[command(about = "Model metadata tooling: resolve columns and auto-create migrations")]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to column-orm.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database connection URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// SQL dialect of generated migrations
    #[arg(long, global = true)]
    dialect: Option<SqlDialect>,

    /// Model definition file
    #[arg(long, global = true)]
    models: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migration management
    Migrate {
        #[command(subcommand)]
        migrate_command: MigrateCommands,
    },

    /// Model inspection
    Models {
        #[command(subcommand)]
        models_command: ModelsCommands,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Generate migrations for every model whose table differs from the database
    AutoCreate {
        /// Print the migrations instead of writing them
        #[arg(long)]
        dry_run: bool,

        /// Migrations directory
        #[arg(long)]
        migrations_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ModelsCommands {
    /// Show the effective columns of a model
    Columns {
        /// Model name
        model: String,
    },

    /// Validate model definitions
    Check,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("column_orm=debug,column_orm_cli=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut overrides = Overrides {
        database_url: cli.database_url,
        models: cli.models,
        migrations_dir: None,
        dialect: cli.dialect,
    };
    if let Commands::Migrate {
        migrate_command: MigrateCommands::AutoCreate { migrations_dir, .. },
    } = &cli.command
    {
        overrides.migrations_dir = migrations_dir.clone();
    }

    let config = Config::resolve(cli.config.as_deref(), overrides)?;
    let registry = models_file::load(&config.models)?;
    tracing::debug!(models = registry.len(), file = %config.models.display(), "loaded model definitions");

    match cli.command {
        Commands::Migrate { migrate_command } => match migrate_command {
            MigrateCommands::AutoCreate { dry_run, .. } => {
                commands::migrate::auto_create(&config, &registry, dry_run)?;
            }
        },
        Commands::Models { models_command } => match models_command {
            ModelsCommands::Columns { model } => {
                commands::model::columns(&registry, &model)?;
            }
            ModelsCommands::Check => {
                commands::model::check(registry)?;
            }
        },
    }

    Ok(())
}
