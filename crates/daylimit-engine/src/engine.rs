//! The limit engine.
//!
//! Public consume/query API over the two storage tiers. The cached
//! consume path is the hot path: one atomic script round-trip, a dirty
//! mark, done. The direct path deliberately keeps the database bottleneck
//! as a measurable baseline and as the fallback when the cache is
//! disabled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, Months, NaiveDate, Utc};
use tokio::sync::RwLock;

use daylimit_cache::{DirtySet, FastStore, ScriptOutcome};
use daylimit_core::{ConsumeOutcome, ConsumeSource, ConsumeStatus};
use daylimit_store::{DirectConsume, RecordStore};

use crate::EngineError;

/// Initial/remaining value written by load-test resets so limits do not
/// exhaust mid-test.
pub const LOAD_TEST_LIMIT: i64 = 999_999_999;

/// Within the last week of a month, startup warm also warms next month.
const NEXT_MONTH_WARM_DAY: u32 = 24;

/// Read-only view of one day's limit, tagged with the tier that served it.
#[derive(Debug, Clone)]
pub struct LimitView {
    /// The calendar date.
    pub date: NaiveDate,
    /// The limit the day started with.
    pub initial_limit: i64,
    /// Amount still available.
    pub remaining: i64,
    /// Amount consumed so far.
    pub consumed: i64,
    /// Number of successful consume transactions.
    pub transaction_count: i64,
    /// Percentage of the initial limit consumed.
    pub utilization_percent: f64,
    /// Which tier served the read.
    pub source: ConsumeSource,
}

/// Read-only view of a month with aggregate totals.
#[derive(Debug, Clone)]
pub struct MonthView {
    /// Requested year.
    pub year: i32,
    /// Requested month (1-12).
    pub month: u32,
    /// Per-day views, ordered by date.
    pub limits: Vec<LimitView>,
    /// Sum of initial limits.
    pub total_initial_limit: i64,
    /// Sum of remaining amounts.
    pub total_remaining: i64,
    /// Sum of consumed amounts.
    pub total_consumed: i64,
    /// Mean utilization across the month.
    pub avg_utilization_percent: f64,
}

/// Snapshot of cache-tier counters for the stats endpoint.
#[derive(Debug, Clone)]
pub struct CacheStatsView {
    /// Whether the cached path is enabled.
    pub enabled: bool,
    /// Number of keys pending sync.
    pub dirty_keys: usize,
    /// Configured key prefix.
    pub key_prefix: String,
    /// Configured entry TTL, in hours.
    pub ttl_hours: u64,
    /// Consume script hits since startup.
    pub hits: u64,
    /// Consume script misses since startup.
    pub misses: u64,
    /// hits / (hits + misses), 0.0 when idle.
    pub hit_ratio: f64,
    /// Backend identifier.
    pub backend: &'static str,
    /// Keys held by the backend, when it can report cheaply.
    pub entry_count: Option<u64>,
    /// Backend memory usage, when reported.
    pub used_memory: Option<String>,
}

#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    consume_success: AtomicU64,
    consume_insufficient: AtomicU64,
    consume_failed: AtomicU64,
}

/// The public consume/query API.
pub struct LimitEngine {
    record: Arc<RecordStore>,
    cache: Arc<dyn FastStore>,
    dirty: Arc<DirtySet>,
    cache_enabled: bool,
    // Reset rewrites keys wholesale; consume holds the read side so a
    // reset cannot interleave with in-flight decrements.
    reset_gate: RwLock<()>,
    counters: Counters,
}

impl LimitEngine {
    /// Assemble an engine over the two tiers.
    #[must_use]
    pub fn new(
        record: Arc<RecordStore>,
        cache: Arc<dyn FastStore>,
        dirty: Arc<DirtySet>,
        cache_enabled: bool,
    ) -> Self {
        Self {
            record,
            cache,
            dirty,
            cache_enabled,
            reset_gate: RwLock::new(()),
            counters: Counters::default(),
        }
    }

    /// Whether the cached path is enabled.
    #[must_use]
    pub const fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// The dirty set shared with the sync worker.
    #[must_use]
    pub fn dirty(&self) -> &Arc<DirtySet> {
        &self.dirty
    }

    /// Attempt to decrement a date's remaining limit by `amount`.
    ///
    /// Routes through the fast store unless the cache is disabled or
    /// `force_direct` is set. Never returns an error: every failure is
    /// folded into the outcome's status (callers may retry transient
    /// failures). `amount` must already be validated positive by the
    /// caller.
    pub async fn consume(
        &self,
        date: NaiveDate,
        amount: i64,
        force_direct: bool,
    ) -> ConsumeOutcome {
        let started = Instant::now();
        let _gate = self.reset_gate.read().await;

        let (status, remaining, source) = if self.cache_enabled && !force_direct {
            let (status, remaining) = self.consume_cached(date, amount).await;
            (status, remaining, ConsumeSource::Cache)
        } else {
            let (status, remaining) = self.consume_direct(date, amount).await;
            (status, remaining, ConsumeSource::Database)
        };

        match status {
            ConsumeStatus::Consumed => self.counters.consume_success.fetch_add(1, Ordering::Relaxed),
            ConsumeStatus::Insufficient => self
                .counters
                .consume_insufficient
                .fetch_add(1, Ordering::Relaxed),
            ConsumeStatus::NotFound | ConsumeStatus::Failed(_) => {
                self.counters.consume_failed.fetch_add(1, Ordering::Relaxed)
            }
        };

        ConsumeOutcome {
            status,
            remaining,
            source,
            latency: started.elapsed(),
        }
    }

    /// Cached path: atomic script, then at most one warm-and-retry on a
    /// miss. A second miss is a transient error, not a loop, so a lost
    /// race between warm and eviction cannot turn into a retry storm.
    async fn consume_cached(&self, date: NaiveDate, amount: i64) -> (ConsumeStatus, i64) {
        let first = match self.cache.consume(date, amount).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(date = %date, error = %e, "Consume script failed");
                return (ConsumeStatus::Failed(e.to_string()), 0);
            }
        };

        match first {
            ScriptOutcome::Consumed { remaining } => {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                self.dirty.add(self.cache.remaining_key(date));
                (ConsumeStatus::Consumed, remaining)
            }
            ScriptOutcome::Insufficient { remaining } => (ConsumeStatus::Insufficient, remaining),
            ScriptOutcome::Missing => {
                self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
                self.consume_after_warm(date, amount).await
            }
        }
    }

    async fn consume_after_warm(&self, date: NaiveDate, amount: i64) -> (ConsumeStatus, i64) {
        let row = match self.record.find_by_date(date).await {
            Ok(Some(row)) => row,
            Ok(None) => return (ConsumeStatus::NotFound, 0),
            Err(e) => {
                tracing::warn!(date = %date, error = %e, "Miss-fill lookup failed");
                return (ConsumeStatus::Failed(e.to_string()), 0);
            }
        };

        if let Err(e) = self.cache.warm(&row).await {
            tracing::warn!(date = %date, error = %e, "Miss-fill warm failed");
            return (ConsumeStatus::Failed(e.to_string()), 0);
        }

        match self.cache.consume(date, amount).await {
            Ok(ScriptOutcome::Consumed { remaining }) => {
                self.dirty.add(self.cache.remaining_key(date));
                (ConsumeStatus::Consumed, remaining)
            }
            Ok(ScriptOutcome::Insufficient { remaining }) => {
                (ConsumeStatus::Insufficient, remaining)
            }
            Ok(ScriptOutcome::Missing) => (
                ConsumeStatus::Failed("key not found after warm".to_string()),
                0,
            ),
            Err(e) => (ConsumeStatus::Failed(e.to_string()), 0),
        }
    }

    /// Direct path: serialized decrement against the record store. Never
    /// touches the fast store and never marks dirty.
    async fn consume_direct(&self, date: NaiveDate, amount: i64) -> (ConsumeStatus, i64) {
        match self.record.consume_direct(date, amount).await {
            Ok(DirectConsume::Consumed { remaining }) => (ConsumeStatus::Consumed, remaining),
            Ok(DirectConsume::Insufficient { remaining }) => {
                (ConsumeStatus::Insufficient, remaining)
            }
            Ok(DirectConsume::NotFound) => (ConsumeStatus::NotFound, 0),
            Err(e) => {
                tracing::warn!(date = %date, error = %e, "Direct consume failed");
                (ConsumeStatus::Failed(e.to_string()), 0)
            }
        }
    }

    /// Read one day's limit, cache-first when enabled, record store
    /// otherwise. Does not cache-fill on miss: only consume warms keys,
    /// so unused dates never occupy the fast store.
    ///
    /// # Errors
    ///
    /// Returns an error if the record-store read fails. A fast-store read
    /// failure is logged and degrades to the record store.
    pub async fn get_limit(&self, date: NaiveDate) -> Result<Option<LimitView>, EngineError> {
        if self.cache_enabled {
            match self.cache.read_entry(date).await {
                Ok(Some(entry)) => {
                    return Ok(Some(LimitView {
                        date: entry.day_date,
                        initial_limit: entry.initial_limit,
                        remaining: entry.remaining,
                        consumed: entry.consumed,
                        transaction_count: entry.transaction_count,
                        utilization_percent: entry.utilization_percent(),
                        source: ConsumeSource::Cache,
                    }));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(date = %date, error = %e, "Cache read failed, falling back");
                }
            }
        }

        Ok(self.record.find_by_date(date).await?.map(|row| LimitView {
            date: row.day_date,
            initial_limit: row.initial_limit,
            remaining: row.remaining,
            consumed: row.consumed,
            transaction_count: row.transaction_count,
            utilization_percent: row.utilization_percent(),
            source: ConsumeSource::Database,
        }))
    }

    /// Read a month, preferring the cache view per day where warmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the record-store read fails.
    #[allow(clippy::cast_precision_loss)]
    pub async fn get_month(&self, year: i32, month: u32) -> Result<MonthView, EngineError> {
        let rows = self.record.find_by_month(year, month).await?;

        let mut limits = Vec::with_capacity(rows.len());
        for row in rows {
            let cached = if self.cache_enabled {
                self.cache.read_entry(row.day_date).await.ok().flatten()
            } else {
                None
            };

            limits.push(match cached {
                Some(entry) => LimitView {
                    date: entry.day_date,
                    initial_limit: entry.initial_limit,
                    remaining: entry.remaining,
                    consumed: entry.consumed,
                    transaction_count: entry.transaction_count,
                    utilization_percent: entry.utilization_percent(),
                    source: ConsumeSource::Cache,
                },
                None => LimitView {
                    date: row.day_date,
                    initial_limit: row.initial_limit,
                    remaining: row.remaining,
                    consumed: row.consumed,
                    transaction_count: row.transaction_count,
                    utilization_percent: row.utilization_percent(),
                    source: ConsumeSource::Database,
                },
            });
        }

        let total_initial_limit = limits.iter().map(|l| l.initial_limit).sum();
        let total_remaining = limits.iter().map(|l| l.remaining).sum();
        let total_consumed = limits.iter().map(|l| l.consumed).sum();
        let avg_utilization_percent = if limits.is_empty() {
            0.0
        } else {
            limits.iter().map(|l| l.utilization_percent).sum::<f64>() / limits.len() as f64
        };

        Ok(MonthView {
            year,
            month,
            limits,
            total_initial_limit,
            total_remaining,
            total_consumed,
            avg_utilization_percent,
        })
    }

    /// Bulk-load a month from the record store into the fast store.
    /// Returns the number of entries warmed.
    ///
    /// # Errors
    ///
    /// Returns an error if either tier fails.
    pub async fn warm_month(&self, year: i32, month: u32) -> Result<usize, EngineError> {
        let rows = self.record.find_by_month(year, month).await?;
        for row in &rows {
            self.cache.warm(row).await?;
        }
        tracing::info!(year, month, count = rows.len(), "Warmed cache for month");
        Ok(rows.len())
    }

    /// Warm the current month; within the last week of the month, also
    /// warm the next month. Invoked at startup and from the admin surface.
    ///
    /// # Errors
    ///
    /// Returns an error if either tier fails.
    pub async fn warm_current_month(&self) -> Result<usize, EngineError> {
        let today = Utc::now().date_naive();
        let mut warmed = self.warm_month(today.year(), today.month()).await?;

        if today.day() >= NEXT_MONTH_WARM_DAY {
            if let Some(next) = today.checked_add_months(Months::new(1)) {
                warmed += self.warm_month(next.year(), next.month()).await?;
            }
        }

        Ok(warmed)
    }

    /// Rewrite every row of the month with initial values and re-warm the
    /// keys, excluding concurrent consumes for the duration. Returns the
    /// number of rows reset.
    ///
    /// # Errors
    ///
    /// Returns an error if either tier fails.
    pub async fn reset_month(
        &self,
        year: i32,
        month: u32,
        load_test: bool,
    ) -> Result<usize, EngineError> {
        let _gate = self.reset_gate.write().await;

        let limit_override = load_test.then_some(LOAD_TEST_LIMIT);
        let rows = self.record.reset_month(year, month, limit_override).await?;

        if self.cache_enabled {
            for row in &rows {
                self.cache.warm(row).await?;
            }
        }

        Ok(rows.len())
    }

    /// Drop every fast-store key under the prefix and forget all dirty
    /// marks. Returns the number of keys removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the fast store fails.
    pub async fn clear_cache(&self) -> Result<u64, EngineError> {
        let removed = self.cache.clear_all().await?;
        self.dirty.clear();
        tracing::info!(removed, "Cache cleared");
        Ok(removed)
    }

    /// Snapshot of the cache-tier counters.
    #[allow(clippy::cast_precision_loss)]
    pub async fn cache_stats(&self) -> CacheStatsView {
        let hits = self.counters.cache_hits.load(Ordering::Relaxed);
        let misses = self.counters.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_ratio = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        let info = match self.cache.server_info().await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read fast-store stats");
                None
            }
        };

        CacheStatsView {
            enabled: self.cache_enabled,
            dirty_keys: self.dirty.len(),
            key_prefix: info
                .as_ref()
                .map(|i| i.key_prefix.clone())
                .unwrap_or_default(),
            ttl_hours: info.as_ref().map_or(0, |i| i.ttl.as_secs() / 3600),
            hits,
            misses,
            hit_ratio,
            backend: info.as_ref().map_or("unknown", |i| i.backend),
            entry_count: info.as_ref().and_then(|i| i.entry_count),
            used_memory: info.and_then(|i| i.used_memory),
        }
    }

    /// Total successful consumes since startup.
    #[must_use]
    pub fn consume_success_count(&self) -> u64 {
        self.counters.consume_success.load(Ordering::Relaxed)
    }

    /// Total insufficient-limit rejections since startup.
    #[must_use]
    pub fn consume_insufficient_count(&self) -> u64 {
        self.counters.consume_insufficient.load(Ordering::Relaxed)
    }

    /// Total failed consumes (not-found or transient) since startup.
    #[must_use]
    pub fn consume_failed_count(&self) -> u64 {
        self.counters.consume_failed.load(Ordering::Relaxed)
    }
}
