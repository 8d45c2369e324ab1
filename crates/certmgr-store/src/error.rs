//! Store error types.

use thiserror::Error;

/// Errors returned by record store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row with the given id.
    #[error("{entity} {id} not found")]
    NotFound {
        /// `"namespace"` or `"certificate"`.
        entity: &'static str,
        /// Requested id.
        id: i64,
    },

    /// Namespace name already taken.
    #[error("namespace name already exists: {0}")]
    DuplicateName(String),

    /// A referential constraint would be violated.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// A stored row could not be mapped back to a record.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The backend itself failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) const fn namespace_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "namespace",
            id,
        }
    }

    pub(crate) const fn certificate_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "certificate",
            id,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Constraint(msg.unwrap_or_else(|| e.to_string()))
            }
            other => Self::Backend(other.to_string()),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
