use thiserror::Error;

use crate::{RunId, Version};

/// Errors that can occur when reading or writing run history.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Another writer appended to the run first.
    /// The expected version did not match the actual version.
    #[error("Concurrency conflict for run {run_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        run_id: RunId,
        expected: Version,
        actual: Version,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The history schema could not be migrated.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The records handed to `append` are not a valid batch.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;
