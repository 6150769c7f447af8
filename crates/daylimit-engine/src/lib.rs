//! The daylimit core: limit engine and sync worker.
//!
//! [`LimitEngine`] owns the cache-vs-direct decision and the
//! warm/miss/retry protocol for consume calls; [`SyncWorker`] periodically
//! flushes the dirty set back into the record store and records sync
//! history. Together with the fast store and dirty set from
//! `daylimit-cache` and the record store from `daylimit-store`, they form
//! the write-behind cache for the contention-bound daily-limit table.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod engine;
pub mod sync;

pub use engine::{CacheStatsView, LimitEngine, LimitView, MonthView};
pub use sync::{SyncConfig, SyncReport, SyncStats, SyncWorker};

use daylimit_cache::CacheError;
use daylimit_store::StoreError;

/// Errors from engine-level operations that touch both tiers.
///
/// Consume never surfaces this type; every consume path terminates in a
/// structured [`daylimit_core::ConsumeOutcome`]. Warm, reset, queries, and
/// sync do propagate it.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The fast store failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}
