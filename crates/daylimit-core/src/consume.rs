//! Consume outcome types.
//!
//! The engine never lets an error escape a consume call; every path
//! terminates in a [`ConsumeOutcome`] whose [`ConsumeStatus`] carries the
//! canonical message for the wire contract.

use std::time::Duration;

/// Which path served a consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeSource {
    /// The fast store served the decrement.
    Cache,
    /// The record store served the decrement (direct path).
    Database,
}

impl ConsumeSource {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "CACHE",
            Self::Database => "DATABASE",
        }
    }
}

/// Terminal status of a consume call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeStatus {
    /// The decrement was admitted.
    Consumed,
    /// The balance did not cover the amount. No mutation happened.
    Insufficient,
    /// No limit row exists for the date.
    NotFound,
    /// A transient failure (script error, transaction failure, lost race
    /// between warm and eviction). The caller may retry.
    Failed(String),
}

impl ConsumeStatus {
    /// Whether the decrement was admitted.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Consumed)
    }

    /// The canonical human-readable message for this status.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Consumed => "Success".to_string(),
            Self::Insufficient => "Insufficient limit".to_string(),
            Self::NotFound => "Date not found".to_string(),
            Self::Failed(detail) => format!("Error: {detail}"),
        }
    }
}

/// Result of a consume call.
#[derive(Debug, Clone)]
pub struct ConsumeOutcome {
    /// Terminal status.
    pub status: ConsumeStatus,
    /// Balance after the call. For a rejected consume this is the observed
    /// balance (0 when unknown, e.g. date not found).
    pub remaining: i64,
    /// Which path served the call.
    pub source: ConsumeSource,
    /// Measured wall-clock latency of the call.
    pub latency: Duration,
}

impl ConsumeOutcome {
    /// Whether the decrement was admitted.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
