use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuickDataError {
    /// Lookup by id, uuid or slug found nothing where a record was required
    #[error("No {entity} found for {key}")]
    NotFound { entity: String, key: String },

    /// Caller supplied an argument outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A filter clause could not be turned into a predicate
    #[error("Invalid predicate on `{field}`: {reason}")]
    InvalidPredicate { field: String, reason: String },

    /// The actor holds none of the permissions that would allow the query
    #[error("Insufficient permissions")]
    PermissionDenied,

    /// No actor was supplied to an operation that needs one
    #[error("User must be logged in to perform this operation")]
    Unauthenticated,

    /// Input failed field rules
    #[error("Validation failed: {}", .0.join(" "))]
    Validation(Vec<String>),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown relation `{relation}` on {entity}")]
    UnknownRelation { entity: String, relation: String },

    /// A relation listed for one kind of sync resolves to the other kind
    #[error("Relation `{relation}` on {entity} is not a {expected} relation")]
    RelationKindMismatch {
        entity: String,
        relation: String,
        expected: &'static str,
    },

    #[error("Relationship sync exceeded the maximum depth of {0}")]
    SyncDepthExceeded(usize),

    /// Nested payload had the wrong shape
    #[error("Invalid payload for `{field}`: {reason}")]
    InvalidPayload { field: String, reason: String },

    #[error("Failed to parse config {}: {}", .0.display(), .1)]
    Config(PathBuf, #[source] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by a store driver
    #[error("Store error: {0}")]
    Store(String),

    /// Rusqlite specific errors
    #[cfg(feature = "rusqlite")]
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

impl QuickDataError {
    pub(crate) fn invalid_predicate(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPredicate {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &str, key: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }
}

/// Result type for data layer operations
pub type Result<T> = std::result::Result<T, QuickDataError>;
