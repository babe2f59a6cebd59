//! Error types for queuedesk
//!
//! One error enum covers the domain failures (store, input, lookup) and the
//! ambient ones (config, I/O, serialization). Uses thiserror for ergonomic
//! error handling.

use thiserror::Error;

/// Result type alias for queuedesk operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// Error type for queuedesk operations
#[derive(Error, Debug)]
pub enum QueueError {
    /// Persisted state could not be read or written
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Malformed submission, rejected before anything is persisted
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Call attempted on a ticket id absent from the current ledger snapshot
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite errors outside the store boundary (schema setup, pragmas)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl QueueError {
    /// Build a `StoreUnavailable` from any displayable failure
    pub fn store(err: impl std::fmt::Display) -> Self {
        QueueError::StoreUnavailable(err.to_string())
    }

    /// Whether the next poll tick is expected to clear this error
    pub fn is_transient(&self) -> bool {
        matches!(self, QueueError::StoreUnavailable(_) | QueueError::Io(_))
    }
}
