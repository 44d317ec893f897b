//! Constraint violations reported by the persistence layer.

use thiserror::Error;

/// Which constraint a write violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintKind {
    /// A unique index already holds this value
    UniqueViolation {
        /// Columns covered by the index, when known
        fields: Vec<String>,
    },
    /// An update or delete targeted a record that does not exist
    RecordNotFound,
    /// A foreign key points at a missing row
    ForeignKeyViolation {
        /// The offending column, when known
        field: Option<String>,
    },
    /// Any other store-specific failure code
    Other {
        /// The store's own error code
        code: String,
    },
}

impl ConstraintKind {
    /// Map a SQLSTATE code onto a constraint kind.
    pub fn from_sqlstate(code: &str) -> Self {
        match code {
            "23505" => ConstraintKind::UniqueViolation { fields: Vec::new() },
            "23503" => ConstraintKind::ForeignKeyViolation { field: None },
            other => ConstraintKind::Other {
                code: other.to_string(),
            },
        }
    }
}

/// A failed write, tagged with the constraint it ran into.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PersistenceError {
    /// Which constraint was violated
    pub kind: ConstraintKind,
    /// The store's own description; never shown to callers
    pub message: String,
}

impl PersistenceError {
    /// Create a persistence error.
    pub fn new(kind: ConstraintKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Unique index violation on `fields`.
    pub fn unique<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        let message = format!("Unique constraint failed on the fields: ({})", fields.join(", "));
        Self::new(ConstraintKind::UniqueViolation { fields }, message)
    }

    /// Write targeted a missing record.
    pub fn record_not_found() -> Self {
        Self::new(
            ConstraintKind::RecordNotFound,
            "An operation failed because it depends on one or more records that were required but not found",
        )
    }

    /// Foreign key violation on `field`.
    pub fn foreign_key(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("Foreign key constraint failed on the field: {}", field);
        Self::new(
            ConstraintKind::ForeignKeyViolation { field: Some(field) },
            message,
        )
    }
}
