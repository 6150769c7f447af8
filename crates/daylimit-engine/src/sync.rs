//! The sync worker.
//!
//! Write-behind flusher: mutations happen in the fast store first, then
//! land here in batches. Each run snapshots the dirty set, writes every
//! key it can back into the record store, removes only the keys it
//! actually wrote, and appends a sync history row.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use daylimit_cache::{keys, DirtySet, FastStore};
use daylimit_core::{SyncRecord, SyncStatus, SyncType};
use daylimit_store::RecordStore;

use crate::EngineError;

/// Sync worker configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Whether the scheduled loop runs.
    pub enabled: bool,
    /// Delay between scheduled runs.
    pub interval: Duration,
    /// Keys per batch within a run.
    pub batch_size: usize,
    /// Write attempts per key before giving up for this run.
    pub retry_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(5),
            batch_size: 100,
            retry_attempts: 3,
        }
    }
}

/// Result of one sync run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// False when the run was skipped (guard held by another run).
    pub ran: bool,
    /// How the run ended.
    pub status: SyncStatus,
    /// Number of keys written back.
    pub records_synced: usize,
    /// Run duration in milliseconds.
    pub duration_ms: u64,
    /// Human-readable summary.
    pub message: String,
}

/// Live and historical sync statistics.
#[derive(Debug, Clone)]
pub struct SyncStats {
    /// Whether the scheduled loop runs.
    pub enabled: bool,
    /// Configured interval, in seconds.
    pub interval_seconds: u64,
    /// When the last completed run finished, if any.
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Records written by the last completed run.
    pub last_sync_record_count: u64,
    /// Keys currently pending sync.
    pub dirty_keys: usize,
    /// Failed runs since the last completed run.
    pub consecutive_failures: u32,
    /// Fully successful runs in the last hour.
    pub total_syncs_last_hour: i64,
    /// Mean run duration in the last hour.
    pub avg_duration_ms: f64,
    /// Records written back in the last hour.
    pub total_records_synced_last_hour: i64,
}

/// Periodic and lifecycle-triggered flusher of the dirty set.
pub struct SyncWorker {
    record: Arc<RecordStore>,
    cache: Arc<dyn FastStore>,
    dirty: Arc<DirtySet>,
    config: SyncConfig,
    in_progress: AtomicBool,
    consecutive_failures: AtomicU32,
    last_success: Mutex<Option<DateTime<Utc>>>,
    last_record_count: AtomicU64,
}

impl SyncWorker {
    /// Assemble a worker over the same tiers as the engine.
    #[must_use]
    pub fn new(
        record: Arc<RecordStore>,
        cache: Arc<dyn FastStore>,
        dirty: Arc<DirtySet>,
        config: SyncConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            record,
            cache,
            dirty,
            config,
            in_progress: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
            last_success: Mutex::new(None),
            last_record_count: AtomicU64::new(0),
        })
    }

    /// The worker configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one sync now. Every trigger (scheduled, manual, startup,
    /// shutdown) goes through this body and the same reentry guard.
    pub async fn run_once(&self, sync_type: SyncType) -> SyncReport {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(sync_type = %sync_type, "Sync already in progress, skipping");
            return SyncReport {
                ran: false,
                status: SyncStatus::Failed,
                records_synced: 0,
                duration_ms: 0,
                message: "Sync already in progress".to_string(),
            };
        }

        let report = self.run_guarded(sync_type).await;
        self.in_progress.store(false, Ordering::Release);
        report
    }

    async fn run_guarded(&self, sync_type: SyncType) -> SyncReport {
        let started = Instant::now();
        let mut record = SyncRecord::start(sync_type);

        match self.flush_dirty().await {
            Ok((synced, failed_keys)) => {
                self.dirty.remove_all(&synced);

                let records_synced = synced.len();
                let synced_count = i64::try_from(records_synced).unwrap_or(i64::MAX);
                if failed_keys == 0 {
                    record.complete(synced_count);
                } else {
                    record.partial(synced_count, format!("{failed_keys} keys failed to sync"));
                }

                if let Err(e) = self.record.insert_sync_record(&record).await {
                    tracing::error!(error = %e, "Failed to record sync history");
                    self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
                    return SyncReport {
                        ran: true,
                        status: SyncStatus::Failed,
                        records_synced,
                        duration_ms: as_millis(started),
                        message: format!("Error: {e}"),
                    };
                }

                self.consecutive_failures.store(0, Ordering::Relaxed);
                self.last_record_count
                    .store(records_synced as u64, Ordering::Relaxed);
                if let Ok(mut last) = self.last_success.lock() {
                    *last = Some(Utc::now());
                }

                let duration_ms = as_millis(started);
                tracing::info!(
                    sync_type = %sync_type,
                    records_synced,
                    failed_keys,
                    duration_ms,
                    "Sync completed"
                );
                SyncReport {
                    ran: true,
                    status: record.status,
                    records_synced,
                    duration_ms,
                    message: if failed_keys == 0 {
                        "Success".to_string()
                    } else {
                        format!("{failed_keys} keys failed to sync")
                    },
                }
            }
            Err(e) => {
                tracing::error!(sync_type = %sync_type, error = %e, "Sync failed");
                self.consecutive_failures.fetch_add(1, Ordering::Relaxed);

                record.fail(e.to_string());
                if let Err(history_err) = self.record.insert_sync_record(&record).await {
                    tracing::error!(error = %history_err, "Failed to record sync failure");
                }

                SyncReport {
                    ran: true,
                    status: SyncStatus::Failed,
                    records_synced: 0,
                    duration_ms: as_millis(started),
                    message: format!("Error: {e}"),
                }
            }
        }
    }

    /// Snapshot the dirty set and write each key's current cache view into
    /// the record store. Returns the keys written and the count of keys
    /// that failed (and so stay dirty).
    async fn flush_dirty(&self) -> Result<(Vec<String>, usize), EngineError> {
        let snapshot = self.dirty.snapshot();
        if snapshot.is_empty() {
            return Ok((Vec::new(), 0));
        }

        tracing::debug!(dirty = snapshot.len(), "Syncing dirty keys");

        let mut synced = Vec::with_capacity(snapshot.len());
        let mut failed = 0;

        for batch in snapshot.chunks(self.config.batch_size.max(1)) {
            for key in batch {
                match self.sync_key(key).await {
                    Ok(true) => synced.push(key.clone()),
                    // Entry gone (evicted) or row missing: nothing to
                    // write; the key stays dirty per the clear-only-synced
                    // rule.
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Failed to sync key");
                        failed += 1;
                    }
                }
            }
        }

        Ok((synced, failed))
    }

    /// Write one key back. `Ok(true)` when the record store reports one
    /// row updated.
    async fn sync_key(&self, key: &str) -> Result<bool, EngineError> {
        let Some(date) = keys::date_from_remaining_key(key) else {
            tracing::warn!(key = %key, "Unparseable dirty key, dropping from this run");
            return Ok(false);
        };

        let Some(entry) = self.cache.read_entry(date).await? else {
            return Ok(false);
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .record
                .sync_from_cache(
                    date,
                    entry.remaining,
                    entry.consumed,
                    entry.transaction_count,
                )
                .await
            {
                Ok(updated) => return Ok(updated > 0),
                Err(e) if attempt < self.config.retry_attempts.max(1) => {
                    tracing::debug!(key = %key, attempt, error = %e, "Retrying key sync");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Whether the worker is healthy: fewer than three consecutive failed
    /// runs and a completed run within the last three intervals. A
    /// disabled worker is trivially healthy.
    #[must_use]
    pub fn healthy(&self) -> bool {
        if !self.config.enabled {
            return true;
        }

        if self.consecutive_failures.load(Ordering::Relaxed) >= 3 {
            return false;
        }

        let last = self.last_success.lock().ok().and_then(|guard| *guard);
        if let Some(last) = last {
            let window = i64::try_from(self.config.interval.as_secs() * 3).unwrap_or(i64::MAX);
            if Utc::now() - last > chrono::Duration::seconds(window) {
                return false;
            }
        }

        true
    }

    /// Live state merged with last-hour history aggregates.
    ///
    /// # Errors
    ///
    /// Returns an error if the history query fails.
    pub async fn stats(&self) -> Result<SyncStats, EngineError> {
        let aggregates = self
            .record
            .sync_stats_since(Utc::now() - chrono::Duration::hours(1))
            .await?;

        Ok(SyncStats {
            enabled: self.config.enabled,
            interval_seconds: self.config.interval.as_secs(),
            last_sync_time: self.last_success.lock().ok().and_then(|guard| *guard),
            last_sync_record_count: self.last_record_count.load(Ordering::Relaxed),
            dirty_keys: self.dirty.len(),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            total_syncs_last_hour: aggregates.successful_syncs,
            avg_duration_ms: aggregates.avg_duration_ms,
            total_records_synced_last_hour: aggregates.total_records_synced,
        })
    }

    /// Spawn the scheduled loop. The task respects the shutdown signal
    /// between runs (not mid-batch); the caller performs the final
    /// shutdown flush via [`run_once`](Self::run_once).
    pub fn spawn(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let worker = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(worker.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the first
            // scheduled run happens one interval after startup.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = worker.run_once(SyncType::Scheduled).await;
                        if report.ran && report.status == SyncStatus::Failed {
                            tracing::warn!(message = %report.message, "Scheduled sync failed");
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::debug!("Sync loop stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[allow(clippy::cast_possible_truncation)]
fn as_millis(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use daylimit_cache::MemoryCache;
    use daylimit_core::DailyLimit;
    use tempfile::TempDir;

    struct Fixture {
        record: Arc<RecordStore>,
        cache: Arc<MemoryCache>,
        dirty: Arc<DirtySet>,
        worker: Arc<SyncWorker>,
        _dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}/limits.db?mode=rwc", dir.path().display());
        let record = Arc::new(RecordStore::connect(&url).await.unwrap());
        let cache = Arc::new(MemoryCache::new("limits", Duration::from_secs(3600)));
        let dirty = Arc::new(DirtySet::new());
        let worker = SyncWorker::new(
            record.clone(),
            cache.clone(),
            dirty.clone(),
            SyncConfig::default(),
        );
        Fixture {
            record,
            cache,
            dirty,
            worker,
            _dir: dir,
        }
    }

    fn date(s: &str) -> chrono::NaiveDate {
        s.parse().unwrap()
    }

    async fn consume_cached(fx: &Fixture, day: &str, amount: i64) {
        use daylimit_cache::{FastStore as _, ScriptOutcome};
        let outcome = fx.cache.consume(date(day), amount).await.unwrap();
        assert!(matches!(outcome, ScriptOutcome::Consumed { .. }));
        fx.dirty.add(fx.cache.remaining_key(date(day)));
    }

    #[tokio::test]
    async fn empty_run_records_history() {
        let fx = fixture().await;

        let report = fx.worker.run_once(SyncType::Manual).await;
        assert!(report.ran);
        assert_eq!(report.status, SyncStatus::Success);
        assert_eq!(report.records_synced, 0);

        let recent = fx.record.recent_sync_records(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].sync_type, SyncType::Manual);
    }

    #[tokio::test]
    async fn dirty_key_converges_to_record_store() {
        let fx = fixture().await;
        fx.record.seed_month(2025, 3, 1_000_000).await.unwrap();
        let row = fx.record.find_by_date(date("2025-03-15")).await.unwrap().unwrap();
        use daylimit_cache::FastStore as _;
        fx.cache.warm(&row).await.unwrap();

        consume_cached(&fx, "2025-03-15", 100).await;

        let report = fx.worker.run_once(SyncType::Manual).await;
        assert_eq!(report.status, SyncStatus::Success);
        assert_eq!(report.records_synced, 1);
        assert!(fx.dirty.is_empty());

        let row = fx.record.find_by_date(date("2025-03-15")).await.unwrap().unwrap();
        assert_eq!(row.remaining, 999_900);
        assert_eq!(row.consumed, 100);
        assert_eq!(row.transaction_count, 1);
    }

    #[tokio::test]
    async fn evicted_key_stays_dirty() {
        let fx = fixture().await;
        fx.record.seed_month(2025, 3, 1000).await.unwrap();
        // Dirty mark without a cache entry behind it.
        fx.dirty.add("limits:remaining:2025:03:15");

        let report = fx.worker.run_once(SyncType::Manual).await;
        assert_eq!(report.status, SyncStatus::Success);
        assert_eq!(report.records_synced, 0);
        assert_eq!(fx.dirty.len(), 1);
    }

    #[tokio::test]
    async fn key_without_row_stays_dirty() {
        let fx = fixture().await;
        // A warmed entry for a date the record store has never seen.
        let orphan = DailyLimit::seed(date("2099-01-01"), 1000);
        use daylimit_cache::FastStore as _;
        fx.cache.warm(&orphan).await.unwrap();
        consume_cached(&fx, "2099-01-01", 10).await;

        let report = fx.worker.run_once(SyncType::Manual).await;
        assert_eq!(report.status, SyncStatus::Success);
        assert_eq!(report.records_synced, 0);
        assert_eq!(fx.dirty.len(), 1);
    }

    #[tokio::test]
    async fn multiple_consumes_sync_once() {
        let fx = fixture().await;
        fx.record.seed_month(2025, 3, 1000).await.unwrap();
        let row = fx.record.find_by_date(date("2025-03-18")).await.unwrap().unwrap();
        use daylimit_cache::FastStore as _;
        fx.cache.warm(&row).await.unwrap();

        consume_cached(&fx, "2025-03-18", 100).await;
        consume_cached(&fx, "2025-03-18", 200).await;
        consume_cached(&fx, "2025-03-18", 50).await;

        let report = fx.worker.run_once(SyncType::Shutdown).await;
        assert_eq!(report.records_synced, 1);

        let row = fx.record.find_by_date(date("2025-03-18")).await.unwrap().unwrap();
        assert_eq!(row.remaining, 650);
        assert_eq!(row.consumed, 350);
        assert_eq!(row.transaction_count, 3);
        assert_eq!(row.initial_limit, row.remaining + row.consumed);
    }

    #[tokio::test]
    async fn guard_blocks_reentry() {
        let fx = fixture().await;
        fx.worker.in_progress.store(true, Ordering::Release);

        let report = fx.worker.run_once(SyncType::Manual).await;
        assert!(!report.ran);
        assert_eq!(report.message, "Sync already in progress");

        fx.worker.in_progress.store(false, Ordering::Release);
        let report = fx.worker.run_once(SyncType::Manual).await;
        assert!(report.ran);
    }

    #[tokio::test]
    async fn health_reflects_failures_and_recency() {
        let fx = fixture().await;
        // Never synced, no failures: healthy.
        assert!(fx.worker.healthy());

        fx.worker.consecutive_failures.store(3, Ordering::Relaxed);
        assert!(!fx.worker.healthy());

        // A successful run clears the failure streak.
        fx.worker.run_once(SyncType::Manual).await;
        assert!(fx.worker.healthy());

        // Stale last-success beyond three intervals: unhealthy.
        if let Ok(mut last) = fx.worker.last_success.lock() {
            *last = Some(Utc::now() - chrono::Duration::seconds(60));
        }
        assert!(!fx.worker.healthy());
    }

    #[tokio::test]
    async fn stats_merge_live_and_history() {
        let fx = fixture().await;
        fx.record.seed_month(2025, 3, 1000).await.unwrap();
        let row = fx.record.find_by_date(date("2025-03-15")).await.unwrap().unwrap();
        use daylimit_cache::FastStore as _;
        fx.cache.warm(&row).await.unwrap();
        consume_cached(&fx, "2025-03-15", 10).await;

        fx.worker.run_once(SyncType::Manual).await;

        let stats = fx.worker.stats().await.unwrap();
        assert!(stats.enabled);
        assert_eq!(stats.interval_seconds, 5);
        assert!(stats.last_sync_time.is_some());
        assert_eq!(stats.last_sync_record_count, 1);
        assert_eq!(stats.dirty_keys, 0);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.total_syncs_last_hour, 1);
        assert_eq!(stats.total_records_synced_last_hour, 1);
    }
}
