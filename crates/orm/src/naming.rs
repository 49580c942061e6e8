//! Naming conventions shared by the resolver, initializer and synthesizer

use heck::ToSnakeCase;

/// Primary key column every model table carries
pub const PRIMARY_KEY: &str = "id";

/// Discriminator column for polymorphic parent tables
pub const DISCRIMINATOR: &str = "type";

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const DELETED_AT: &str = "deleted_at";

/// Convert a property or model name to snake_case
pub fn snake_case(name: &str) -> String {
    name.to_snake_case()
}

/// Default table name: snake_case with the last word pluralised (`InvoiceItem` -> `invoice_items`)
pub fn table_name(model: &str) -> String {
    let snake = snake_case(model);
    match snake.rsplit_once('_') {
        Some((head, last)) => format!("{}_{}", head, pluralize(last)),
        None => pluralize(&snake),
    }
}

/// Foreign key referencing a model (`Customer` -> `customer_id`)
pub fn foreign_key(model: &str) -> String {
    format!("{}_{}", snake_case(model), PRIMARY_KEY)
}

/// Simple pluralization (English-centric)
pub fn pluralize(word: &str) -> String {
    if word.ends_with('y')
        && !["ay", "ey", "iy", "oy", "uy"].iter().any(|s| word.ends_with(s))
    {
        format!("{}ies", &word[..word.len() - 1])
    } else if word.ends_with('s')
        || word.ends_with("sh")
        || word.ends_with("ch")
        || word.ends_with('x')
        || word.ends_with('z')
    {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_key_uses_singular_snake_case() {
        assert_eq!(foreign_key("Customer"), "customer_id");
        assert_eq!(foreign_key("InvoiceLine"), "invoice_line_id");
    }

    #[test]
    fn test_table_name_pluralises_last_word() {
        assert_eq!(table_name("Invoice"), "invoices");
        assert_eq!(table_name("InvoiceItem"), "invoice_items");
        assert_eq!(table_name("Category"), "categories");
        assert_eq!(table_name("Address"), "addresses");
        assert_eq!(table_name("Key"), "keys");
    }
}
