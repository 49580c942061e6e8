//! Error types for the column ORM
//!
//! One error enum covers metadata resolution, migration synthesis and the
//! persistence protocol. Discovery errors are reported per model by the
//! migration batch; persistence errors propagate unchanged out of the
//! transaction that raised them.

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Result type alias for ORM operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for ORM operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// A model lacks the metadata needed to resolve it
    #[error("Metadata error for model '{model}': {message}")]
    Metadata { model: String, message: String },

    /// A model name that is not present in the registry
    #[error("Unknown model '{0}'")]
    UnknownModel(String),

    /// Database collaborator failure
    #[error("Database error: {0}")]
    Database(String),

    /// Transaction control failure (begin/commit/rollback)
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Child-role load found no parent-table row for the link value
    #[error("Parent row missing for model '{model}': no row in '{table}' with key {key}")]
    MissingParentRow {
        model: String,
        table: String,
        key: String,
    },

    /// Primary key or parent link is missing on a persisted record
    #[error("Primary key is missing or invalid for model '{0}'")]
    MissingPrimaryKey(String),

    /// Relationship resolution or loading failed
    #[error("Relationship error: {0}")]
    Relationship(String),

    /// Migration synthesis or storage failed
    #[error("Migration error: {0}")]
    Migration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

impl OrmError {
    /// Create a new metadata error
    pub fn metadata(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Metadata {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create a new database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Whether this error is recoverable at model granularity during discovery
    pub fn is_discovery_error(&self) -> bool {
        matches!(self, Self::Metadata { .. } | Self::UnknownModel(_))
    }
}

// Convert from sqlx errors
impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        OrmError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_error_display() {
        let err = OrmError::metadata("Invoice", "no column metadata");
        assert_eq!(
            err.to_string(),
            "Metadata error for model 'Invoice': no column metadata"
        );
        assert!(err.is_discovery_error());
    }

    #[test]
    fn test_missing_parent_row_display() {
        let err = OrmError::MissingParentRow {
            model: "Car".to_string(),
            table: "vehicles".to_string(),
            key: "7".to_string(),
        };
        assert!(err.to_string().contains("'vehicles'"));
        assert!(!err.is_discovery_error());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::AlreadyExists, "exists");
        let err: OrmError = io.into();
        assert!(matches!(err, OrmError::Io(_)));
    }
}
