//! Durable record store for daylimit.
//!
//! The system of record for daily limits and sync history, backed by
//! SQLite through `sqlx`. The cache tier owns the live value for a warmed
//! key; rows here are a periodically refreshed lower-bound snapshot, plus
//! the baseline for the deliberately contended direct consume path.
//!
//! # Concurrency
//!
//! SQLite serializes writers at the database level (WAL journal, one
//! writer at a time, busy-timeout queuing). The direct consume path is a
//! single conditional `UPDATE ... RETURNING`, so concurrent callers
//! serialize and every admitted decrement is safe, the same guarantee a
//! per-row pessimistic lock gives on a server database.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod history;
pub mod record;
pub mod schema;

pub use error::{Result, StoreError};
pub use history::SyncAggregates;
pub use record::{DirectConsume, RecordStore};
