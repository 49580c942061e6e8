//! TOML model definition files
//!
//! ```toml
//! [[model]]
//! name = "Vehicle"
//! extends = "Model"
//! table = { table = "vehicles" }
//!
//! [[model.properties]]
//! name = "make"
//! column = { type = "string", length = 80 }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use column_orm::{ModelDefinition, ModelRegistry};
use serde::Deserialize;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ModelsFile {
    /// Register the built-in `Model` base before the file's models
    #[serde(default = "default_true")]
    base: bool,
    #[serde(default, rename = "model")]
    models: Vec<ModelDefinition>,
}

pub fn parse(content: &str) -> Result<ModelRegistry> {
    let file: ModelsFile = toml::from_str(content).context("Invalid model definitions")?;
    let mut registry = if file.base {
        ModelRegistry::with_base()
    } else {
        ModelRegistry::new()
    };
    for definition in file.models {
        let name = definition.name.clone();
        registry
            .register(definition)
            .with_context(|| format!("Cannot register model {}", name))?;
    }
    Ok(registry)
}

pub fn load(path: &Path) -> Result<ModelRegistry> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read model definitions from {}", path.display()))?;
    parse(&content).with_context(|| format!("In model file {}", path.display()))
}
