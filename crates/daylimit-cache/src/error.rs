//! Error types for the fast-store adapter.

/// Result type for fast-store operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur against the fast store.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Could not reach the store.
    #[error("cache connection error: {0}")]
    Connection(String),

    /// A command or script failed.
    #[error("cache command error: {0}")]
    Command(String),

    /// A stored value could not be parsed.
    #[error("malformed cache entry at {key}: {detail}")]
    Malformed {
        /// Key holding the bad value.
        key: String,
        /// What failed to parse.
        detail: String,
    },
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
            Self::Connection(err.to_string())
        } else {
            Self::Command(err.to_string())
        }
    }
}
