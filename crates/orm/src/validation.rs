//! Attribute validation from declared property rules
//!
//! Covers the core rule set; any other expression is left to the host
//! validator and skipped here.

use std::fmt;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::reflector::ValidationRules;
use crate::value::{Attributes, Value};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)+$").expect("email pattern is valid")
});

/// Validation failures keyed by column, in rule order
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
pub struct ValidationErrors {
    errors: IndexMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
            .collect();
        write!(f, "Validation failed: {}", parts.join("; "))
    }
}

/// Evaluates declared rules against attribute maps
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: ValidationRules,
}

impl Validator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    pub fn validate(&self, attributes: &Attributes) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for (field, rules) in &self.rules {
            let Some(value) = attributes.get(field).filter(|v| !is_blank(v)) else {
                if let Some(message) = rules.get("required") {
                    errors.add(field, message_or(message, || format!("The {} field is required.", field)));
                }
                continue;
            };
            let numeric_field = rules.contains_key("integer") || rules.contains_key("numeric");

            for (rule, message) in rules {
                let (name, argument) = match rule.split_once(':') {
                    Some((name, argument)) => (name, Some(argument)),
                    None => (rule.as_str(), None),
                };
                let passed = match check(name, argument, value, numeric_field) {
                    Some(passed) => passed,
                    None => {
                        debug!("Skipping validation rule '{}' on '{}'", rule, field);
                        continue;
                    }
                };
                if !passed {
                    errors.add(field, message_or(message, || default_message(field, name, argument)));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn message_or(message: &Option<String>, default: impl FnOnce() -> String) -> String {
    message.clone().unwrap_or_else(default)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Size used by `min` / `max`: numeric value for numeric fields, else string length
fn size(value: &Value, numeric_field: bool) -> Option<f64> {
    match value {
        Value::String(s) if !numeric_field => Some(s.chars().count() as f64),
        other => numeric(other),
    }
}

/// `None` when the rule is not part of the core set
fn check(rule: &str, argument: Option<&str>, value: &Value, numeric_field: bool) -> Option<bool> {
    let passed = match rule {
        "required" | "nullable" => true,
        "string" => matches!(value, Value::String(_)),
        "integer" => match value {
            Value::Integer(_) => true,
            Value::String(s) => s.trim().parse::<i64>().is_ok(),
            _ => false,
        },
        "numeric" => numeric(value).is_some(),
        "boolean" => match value {
            Value::Bool(_) => true,
            Value::Integer(i) => *i == 0 || *i == 1,
            Value::String(s) => matches!(s.as_str(), "0" | "1" | "true" | "false"),
            _ => false,
        },
        "email" => value.as_str().map(|s| EMAIL.is_match(s)).unwrap_or(false),
        "min" | "max" => {
            let limit: f64 = argument?.trim().parse().ok()?;
            match size(value, numeric_field) {
                Some(size) if rule == "min" => size >= limit,
                Some(size) => size <= limit,
                None => false,
            }
        }
        "in" => {
            let allowed = argument?;
            let actual = value.to_string();
            allowed.split(',').any(|candidate| candidate.trim() == actual)
        }
        _ => return None,
    };
    Some(passed)
}

fn default_message(field: &str, rule: &str, argument: Option<&str>) -> String {
    match (rule, argument) {
        ("min", Some(n)) => format!("The {} field must be at least {}.", field, n),
        ("max", Some(n)) => format!("The {} field must not be greater than {}.", field, n),
        ("in", _) => format!("The selected {} is invalid.", field),
        ("email", _) => format!("The {} field must be a valid email address.", field),
        (rule, _) => format!("The {} field must be {}.", field, rule_noun(rule)),
    }
}

fn rule_noun(rule: &str) -> &str {
    match rule {
        "string" => "a string",
        "integer" => "an integer",
        "numeric" => "a number",
        "boolean" => "true or false",
        other => other,
    }
}
