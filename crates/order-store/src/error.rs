use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be mapped onto a record.
    #[error("Corrupt {column} value: {reason}")]
    Decode {
        column: &'static str,
        reason: String,
    },

    /// The store refused the operation (used by the in-memory store to
    /// simulate an outage).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn decode(column: &'static str, reason: impl ToString) -> Self {
        StoreError::Decode {
            column,
            reason: reason.to_string(),
        }
    }
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
