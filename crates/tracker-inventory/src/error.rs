use thiserror::Error;

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// No record with the given kind and id exists.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The supplied id is not in the kind's id format.
    #[error("invalid {kind} id: {id}")]
    InvalidId { kind: &'static str, id: String },

    /// A required request field was empty.
    #[error("{field} is required")]
    MissingField { field: &'static str },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored attributes could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InventoryError>;
