//! Fast-store adapter for daylimit.
//!
//! This crate provides the typed, narrow interface to the key/value tier
//! that serves the hot consume path:
//!
//! - [`FastStore`]: the adapter trait; the one operation that matters is
//!   [`FastStore::consume`], an atomic check-and-decrement executed
//!   server-side.
//! - [`RedisCache`]: the Redis implementation (Lua consume script).
//! - [`MemoryCache`]: an in-process implementation with the same
//!   atomicity contract, used for single-instance runs and tests.
//! - [`DirtySet`]: the set of keys that have diverged from the record
//!   store since the last sync.
//!
//! # Keyspace
//!
//! One logical entry per date, split across two physical keys so the hot
//! decrement touches a single integer:
//!
//! ```text
//! <prefix>:remaining:YYYY:MM:DD   → integer string
//! <prefix>:meta:YYYY:MM:DD        → hash of initial_limit, consumed,
//!                                   transaction_count, version, day_date
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod dirty;
pub mod error;
pub mod keys;
pub mod memory;
pub mod redis_store;

pub use dirty::DirtySet;
pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use redis_store::RedisCache;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use daylimit_core::{DailyLimit, LimitCacheEntry};

/// Outcome of the atomic consume script.
///
/// Maps the script's `(status, new_remaining)` pair: `-1` when the
/// remaining key is absent, `0` when the balance does not cover the
/// amount, `1` when the decrement was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// The remaining key does not exist (never warmed, or evicted).
    Missing,
    /// The balance does not cover the amount. Nothing was mutated.
    Insufficient {
        /// Observed balance.
        remaining: i64,
    },
    /// The decrement was applied, consumed and transaction count bumped.
    Consumed {
        /// Balance after the decrement.
        remaining: i64,
    },
}

/// Descriptive stats about a fast-store backend.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    /// Backend identifier (`"redis"` or `"memory"`).
    pub backend: &'static str,
    /// Configured key prefix.
    pub key_prefix: String,
    /// Configured entry TTL.
    pub ttl: Duration,
    /// Number of keys held, when the backend can report it cheaply.
    pub entry_count: Option<u64>,
    /// Human-readable memory usage, when the backend reports it.
    pub used_memory: Option<String>,
}

/// Typed, narrow interface to the key/value store backing the hot path.
///
/// Implementations must guarantee that [`consume`](FastStore::consume)
/// executes as a single atomic unit: the store serializes it against every
/// other command on the same keys. Without that guarantee two concurrent
/// decrements can both observe a sufficient balance and both succeed.
#[async_trait]
pub trait FastStore: Send + Sync {
    /// Populate (or overwrite) both keys for a date from a record-store
    /// row, renewing the TTL on both.
    async fn warm(&self, limit: &DailyLimit) -> CacheResult<()>;

    /// Atomically check-and-decrement the remaining key by `amount`,
    /// bumping `consumed` and `transaction_count` in the metadata hash on
    /// success.
    async fn consume(&self, date: NaiveDate, amount: i64) -> CacheResult<ScriptOutcome>;

    /// Read the full entry for a date. `None` when the remaining key is
    /// absent. The balance always comes from the scalar key; metadata
    /// fields missing from the hash default to zero.
    async fn read_entry(&self, date: NaiveDate) -> CacheResult<Option<LimitCacheEntry>>;

    /// Remove every key under the configured prefix. Returns the number of
    /// keys removed.
    async fn clear_all(&self) -> CacheResult<u64>;

    /// Backend stats for the cache stats endpoint.
    async fn server_info(&self) -> CacheResult<ServerInfo>;

    /// The remaining-key name for a date under this store's prefix.
    fn remaining_key(&self, date: NaiveDate) -> String;
}
