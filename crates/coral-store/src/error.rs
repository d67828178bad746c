use coral_shared::ValidationError;
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The event failed validation and was not written.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A write collided with an existing row (e.g. duplicate event id).
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// A stored row could not be decoded.
    #[error("Corrupt ledger row: {0}")]
    Corrupt(String),

    /// The connection lock was poisoned by a panicking writer.
    #[error("Ledger connection poisoned")]
    Poisoned,
}

impl StoreError {
    /// Whether retrying the same write later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Sqlite(_) | StoreError::Io(_) | StoreError::Poisoned)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
