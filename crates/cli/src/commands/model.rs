use anyhow::{bail, Result};
use column_orm::{ColumnOrigin, ColumnResolver, ModelCatalog, ModelRegistry, ResolvedColumn};
use console::style;

/// Print the effective column set of one model
pub fn columns(registry: &ModelRegistry, model: &str) -> Result<()> {
    let columns = ColumnResolver::new(registry).resolve(model)?;

    println!("{} ({} columns)", style(model).bold(), columns.len());
    for column in columns.iter() {
        println!("  {}", describe(column));
    }
    Ok(())
}

fn describe(column: &ResolvedColumn) -> String {
    let origin = match column.origin {
        ColumnOrigin::Declared => "declared",
        ColumnOrigin::Inherited => "inherited",
        ColumnOrigin::ParentLink => "parent link",
        ColumnOrigin::Discriminator => "discriminator",
    };

    let descriptor = &column.descriptor;
    let mut flags = Vec::new();
    if descriptor.nullable {
        flags.push("nullable".to_string());
    }
    if descriptor.index {
        flags.push("index".to_string());
    }
    if descriptor.hidden {
        flags.push("hidden".to_string());
    }
    if let Some(related) = &column.related {
        flags.push(format!("-> {}", related));
    }

    let sql_type = match descriptor.length {
        Some(length) => format!("{}({})", descriptor.sql_type, length),
        None => descriptor.sql_type.clone(),
    };

    let mut line = format!("{:<24} {:<14} {}", column.name, sql_type, style(origin).dim());
    if !flags.is_empty() {
        line.push_str(&format!(" [{}]", flags.join(", ")));
    }
    line
}

/// Validate references and build every concrete model's descriptor
pub fn check(registry: ModelRegistry) -> Result<()> {
    let mut problems: Vec<String> = registry.validate().iter().map(ToString::to_string).collect();

    let catalog = ModelCatalog::new(registry);
    let models: Vec<String> = catalog
        .registry()
        .concrete_models()
        .map(|definition| definition.name.clone())
        .collect();
    if problems.is_empty() {
        for model in &models {
            if let Err(err) = catalog.descriptor(model) {
                problems.push(err.to_string());
            }
        }
    }

    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("{} {}", style("✗").red(), problem);
        }
        bail!("{} problem(s) found in model definitions", problems.len());
    }

    println!("{} {} model(s) OK", style("✓").green(), models.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models_file;

    #[test]
    fn test_check_reports_unknown_references() {
        let registry = models_file::parse(
            r#"
[[model]]
name = "Car"
extends = "Vehicle"
table = { table = "cars" }
"#,
        )
        .unwrap();
        assert!(check(registry).is_err());
    }

    #[test]
    fn test_describe_marks_foreign_keys() {
        let registry = models_file::parse(
            r#"
[[model]]
name = "Customer"
extends = "Model"
table = { table = "customers" }

[[model]]
name = "Order"
extends = "Model"
table = { table = "orders" }

[[model.properties]]
name = "customer"
model = "Customer"
column = { type = "integer" }
"#,
        )
        .unwrap();

        let columns = ColumnResolver::new(&registry).resolve("Order").unwrap();
        let line = describe(columns.get("customer_id").unwrap());
        assert!(line.starts_with("customer_id"));
        assert!(line.contains("-> Customer"));
        assert!(check(registry).is_ok());
    }
}
