//! Relationship descriptors attached to model properties

use serde::{Deserialize, Serialize};

/// Defines the type of relationship between models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// Many-to-one relationship (belongsTo)
    BelongsTo,
    /// One-to-one relationship (hasOne)
    HasOne,
    /// One-to-many relationship (hasMany)
    HasMany,
    /// One-to-one relationship through an intermediate model
    HasOneThrough,
}

impl RelationshipType {
    /// Returns true if this relationship returns a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany)
    }
}

/// Relationship declared on one typed property
///
/// The property's declared model type supplies the related model for
/// `BelongsTo`, `HasOne` and `HasOneThrough`; `HasMany` names it explicitly.
/// Key overrides left empty fall back to the framework conventions when the
/// relation is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationshipDescriptor {
    BelongsTo {
        #[serde(default)]
        foreign_key: Option<String>,
        #[serde(default)]
        owner_key: Option<String>,
        /// Relation alias used to identify the relation
        #[serde(default)]
        relation: Option<String>,
        #[serde(default, alias = "with")]
        eager: bool,
        #[serde(default)]
        load: Vec<String>,
    },
    HasOne {
        #[serde(default)]
        foreign_key: Option<String>,
        #[serde(default)]
        local_key: Option<String>,
        #[serde(default, alias = "with")]
        eager: bool,
        #[serde(default)]
        load: Vec<String>,
    },
    HasMany {
        related: String,
        #[serde(default)]
        foreign_key: Option<String>,
        #[serde(default)]
        local_key: Option<String>,
        #[serde(default, alias = "with")]
        eager: bool,
        #[serde(default)]
        load: Vec<String>,
    },
    HasOneThrough {
        through: String,
        #[serde(default)]
        first_key: Option<String>,
        #[serde(default)]
        second_key: Option<String>,
        #[serde(default)]
        local_key: Option<String>,
        #[serde(default)]
        second_local_key: Option<String>,
        #[serde(default, alias = "with")]
        eager: bool,
        #[serde(default)]
        load: Vec<String>,
    },
}

impl RelationshipDescriptor {
    pub fn belongs_to() -> Self {
        Self::BelongsTo {
            foreign_key: None,
            owner_key: None,
            relation: None,
            eager: false,
            load: Vec::new(),
        }
    }

    pub fn has_one() -> Self {
        Self::HasOne {
            foreign_key: None,
            local_key: None,
            eager: false,
            load: Vec::new(),
        }
    }

    pub fn has_many(related: impl Into<String>) -> Self {
        Self::HasMany {
            related: related.into(),
            foreign_key: None,
            local_key: None,
            eager: false,
            load: Vec::new(),
        }
    }

    pub fn has_one_through(through: impl Into<String>) -> Self {
        Self::HasOneThrough {
            through: through.into(),
            first_key: None,
            second_key: None,
            local_key: None,
            second_local_key: None,
            eager: false,
            load: Vec::new(),
        }
    }

    pub fn relationship_type(&self) -> RelationshipType {
        match self {
            Self::BelongsTo { .. } => RelationshipType::BelongsTo,
            Self::HasOne { .. } => RelationshipType::HasOne,
            Self::HasMany { .. } => RelationshipType::HasMany,
            Self::HasOneThrough { .. } => RelationshipType::HasOneThrough,
        }
    }

    /// Whether the relation is loaded proactively with its owner
    pub fn is_eager(&self) -> bool {
        match self {
            Self::BelongsTo { eager, .. }
            | Self::HasOne { eager, .. }
            | Self::HasMany { eager, .. }
            | Self::HasOneThrough { eager, .. } => *eager,
        }
    }

    /// Nested relation paths pre-loaded on the related records
    pub fn load_paths(&self) -> &[String] {
        match self {
            Self::BelongsTo { load, .. }
            | Self::HasOne { load, .. }
            | Self::HasMany { load, .. }
            | Self::HasOneThrough { load, .. } => load,
        }
    }

    /// Enable eager loading by default
    pub fn with_eager(mut self) -> Self {
        match &mut self {
            Self::BelongsTo { eager, .. }
            | Self::HasOne { eager, .. }
            | Self::HasMany { eager, .. }
            | Self::HasOneThrough { eager, .. } => *eager = true,
        }
        self
    }

    /// Add a nested relation path to pre-load
    pub fn with_load(mut self, path: impl Into<String>) -> Self {
        match &mut self {
            Self::BelongsTo { load, .. }
            | Self::HasOne { load, .. }
            | Self::HasMany { load, .. }
            | Self::HasOneThrough { load, .. } => load.push(path.into()),
        }
        self
    }

    /// Override the foreign key (first key for `HasOneThrough`)
    pub fn with_foreign_key(mut self, key: impl Into<String>) -> Self {
        match &mut self {
            Self::BelongsTo { foreign_key, .. }
            | Self::HasOne { foreign_key, .. }
            | Self::HasMany { foreign_key, .. } => *foreign_key = Some(key.into()),
            Self::HasOneThrough { first_key, .. } => *first_key = Some(key.into()),
        }
        self
    }
}
