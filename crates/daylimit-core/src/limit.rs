//! Daily limit entities.
//!
//! [`DailyLimit`] is the durable row in the record store; [`LimitCacheEntry`]
//! is its fast-store projection.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A daily spending limit.
///
/// This is the "hot row" that collapses under direct database contention:
/// one row per calendar date, read and decremented by many concurrent
/// clients. The invariant `initial_limit = remaining + consumed` holds at
/// every commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLimit {
    /// The calendar date this limit applies to (unique).
    pub day_date: NaiveDate,

    /// The limit the day started with, in minor-currency units.
    pub initial_limit: i64,

    /// Amount still available.
    pub remaining: i64,

    /// Amount consumed so far.
    pub consumed: i64,

    /// Number of successful consume transactions.
    pub transaction_count: i64,

    /// Monotonically non-decreasing write counter. Bumped by the direct
    /// path and by sync write-backs; never checked on the cached path.
    pub version: i64,

    /// When the row was created.
    pub created_at: DateTime<Utc>,

    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

impl DailyLimit {
    /// Create a fresh, unconsumed limit for a date.
    #[must_use]
    pub fn seed(day_date: NaiveDate, initial_limit: i64) -> Self {
        let now = Utc::now();
        Self {
            day_date,
            initial_limit,
            remaining: initial_limit,
            consumed: 0,
            transaction_count: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the remaining amount covers `amount`.
    #[must_use]
    pub const fn has_sufficient(&self, amount: i64) -> bool {
        self.remaining >= amount
    }

    /// Percentage of the initial limit consumed so far.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization_percent(&self) -> f64 {
        if self.initial_limit == 0 {
            return 0.0;
        }
        (self.consumed as f64 * 100.0) / self.initial_limit as f64
    }

    /// Project into the fast-store representation.
    #[must_use]
    pub fn to_cache_entry(&self) -> LimitCacheEntry {
        LimitCacheEntry {
            day_date: self.day_date,
            initial_limit: self.initial_limit,
            remaining: self.remaining,
            consumed: self.consumed,
            transaction_count: self.transaction_count,
            version: self.version,
        }
    }
}

/// Fast-store view of a daily limit.
///
/// One logical record per date, physically split into a scalar remaining
/// key (the only field mutated on the hot path) and a metadata mapping.
/// `remaining` here is always read from the scalar key; the metadata copy
/// of the balance is never consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitCacheEntry {
    /// The calendar date.
    pub day_date: NaiveDate,

    /// The limit the day started with.
    pub initial_limit: i64,

    /// Amount still available (from the scalar remaining key).
    pub remaining: i64,

    /// Amount consumed so far.
    pub consumed: i64,

    /// Number of successful consume transactions.
    pub transaction_count: i64,

    /// Write counter as of the last warm.
    pub version: i64,
}

impl LimitCacheEntry {
    /// Percentage of the initial limit consumed so far.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization_percent(&self) -> f64 {
        if self.initial_limit == 0 {
            return 0.0;
        }
        (self.consumed as f64 * 100.0) / self.initial_limit as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn seed_starts_unconsumed() {
        let limit = DailyLimit::seed(date("2025-03-15"), 1_000_000);

        assert_eq!(limit.remaining, 1_000_000);
        assert_eq!(limit.consumed, 0);
        assert_eq!(limit.transaction_count, 0);
        assert_eq!(limit.version, 0);
        assert_eq!(limit.initial_limit, limit.remaining + limit.consumed);
    }

    #[test]
    fn sufficiency_check() {
        let limit = DailyLimit::seed(date("2025-03-15"), 100);

        assert!(limit.has_sufficient(100));
        assert!(limit.has_sufficient(1));
        assert!(!limit.has_sufficient(101));
    }

    #[test]
    fn utilization() {
        let mut limit = DailyLimit::seed(date("2025-03-15"), 1000);
        limit.remaining = 250;
        limit.consumed = 750;

        assert!((limit.utilization_percent() - 75.0).abs() < f64::EPSILON);

        let empty = DailyLimit::seed(date("2025-03-16"), 0);
        assert!((empty.utilization_percent() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cache_entry_projection() {
        let mut limit = DailyLimit::seed(date("2025-03-15"), 1000);
        limit.remaining = 900;
        limit.consumed = 100;
        limit.transaction_count = 1;

        let entry = limit.to_cache_entry();
        assert_eq!(entry.day_date, limit.day_date);
        assert_eq!(entry.remaining, 900);
        assert_eq!(entry.consumed, 100);
        assert_eq!(entry.initial_limit, entry.remaining + entry.consumed);
    }
}
