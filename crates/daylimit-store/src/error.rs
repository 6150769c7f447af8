//! Error types for the record store.

/// Result type for record-store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in record-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A query or transaction failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A month argument was out of range.
    #[error("invalid month: {year}-{month:02}")]
    InvalidMonth {
        /// Requested year.
        year: i32,
        /// Requested month (1-12).
        month: u32,
    },
}
