//! CLI configuration
//!
//! Resolved from `column-orm.toml` (optional), then the `DATABASE_URL`
//! environment variable, then command-line flags; later sources win.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use column_orm::SqlDialect;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "column-orm.toml";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: Option<String>,
    /// Model definition file
    pub models: PathBuf,
    pub migrations_dir: PathBuf,
    pub dialect: SqlDialect,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            models: PathBuf::from("models.toml"),
            migrations_dir: PathBuf::from("migrations"),
            dialect: SqlDialect::default(),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub models: Option<PathBuf>,
    pub migrations_dir: Option<PathBuf>,
    pub dialect: Option<SqlDialect>,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid configuration")
    }

    /// Read an explicit config file, or `column-orm.toml` when present
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("In config file {}", path.display()))
    }

    /// Full resolution: file, then environment, then flags
    pub fn resolve(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env(std::env::var(DATABASE_URL_ENV).ok());
        config.apply_overrides(overrides);
        Ok(config)
    }

    pub fn apply_env(&mut self, database_url: Option<String>) {
        if let Some(url) = database_url.filter(|url| !url.is_empty()) {
            self.database_url = Some(url);
        }
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.database_url {
            self.database_url = Some(url);
        }
        if let Some(models) = overrides.models {
            self.models = models;
        }
        if let Some(dir) = overrides.migrations_dir {
            self.migrations_dir = dir;
        }
        if let Some(dialect) = overrides.dialect {
            self.dialect = dialect;
        }
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url.as_deref().with_context(|| {
            format!(
                "No database URL configured; set {} or pass --database-url",
                DATABASE_URL_ENV
            )
        })
    }
}
