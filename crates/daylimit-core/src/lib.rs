//! Core types for the daylimit platform.
//!
//! This crate provides the foundational types used throughout daylimit:
//!
//! - **Limits**: [`DailyLimit`], [`LimitCacheEntry`]
//! - **Consume outcomes**: [`ConsumeOutcome`], [`ConsumeStatus`], [`ConsumeSource`]
//! - **Sync history**: [`SyncRecord`], [`SyncType`], [`SyncStatus`]
//!
//! # Amounts
//!
//! All amounts are minor-currency units (cents) stored as `i64` to avoid
//! floating point precision issues. A daily limit of $10,000 is stored as
//! `1_000_000`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod consume;
pub mod limit;
pub mod sync;

pub use consume::{ConsumeOutcome, ConsumeSource, ConsumeStatus};
pub use limit::{DailyLimit, LimitCacheEntry};
pub use sync::{SyncRecord, SyncStatus, SyncType};
