//! The record store.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Months, NaiveDate, Utc};
use daylimit_core::DailyLimit;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::error::{Result, StoreError};
use crate::schema;

/// Outcome of a direct (non-cached) consume against the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectConsume {
    /// The decrement was admitted.
    Consumed {
        /// Balance after the decrement.
        remaining: i64,
    },
    /// The balance did not cover the amount. Nothing was mutated.
    Insufficient {
        /// Observed balance.
        remaining: i64,
    },
    /// No row exists for the date.
    NotFound,
}

/// SQLite-backed store for daily limits and sync history.
pub struct RecordStore {
    pool: Pool<Sqlite>,
}

impl RecordStore {
    /// Open (or create) the database at `url` and apply the schema.
    ///
    /// Accepts `sqlx` SQLite URLs, e.g. `sqlite:daylimit.db?mode=rwc`.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is invalid, the database cannot be
    /// opened, or the schema cannot be applied.
    pub async fn connect(url: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Queue writers instead of surfacing transient lock errors.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits one writer at a time; a single connection
            // avoids "database is locked" failures under load.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        for statement in schema::all_statements() {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Plain read of one date, no lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_date(&self, date: NaiveDate) -> Result<Option<DailyLimit>> {
        let row: Option<LimitRow> = sqlx::query_as(
            "SELECT day_date, initial_limit, remaining, consumed, transaction_count,
                    version, created_at, updated_at
               FROM daily_limits WHERE day_date = ?1",
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// All rows of a month, ordered by date.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidMonth` for an out-of-range month, or a
    /// database error.
    pub async fn find_by_month(&self, year: i32, month: u32) -> Result<Vec<DailyLimit>> {
        let (start, end) = month_range(year, month)?;

        let rows: Vec<LimitRow> = sqlx::query_as(
            "SELECT day_date, initial_limit, remaining, consumed, transaction_count,
                    version, created_at, updated_at
               FROM daily_limits
              WHERE day_date >= ?1 AND day_date < ?2
              ORDER BY day_date",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Administratively seed one fresh row per day of the month, skipping
    /// dates that already exist. Returns the number of rows inserted.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidMonth` for an out-of-range month, or a
    /// database error.
    pub async fn seed_month(&self, year: i32, month: u32, initial_limit: i64) -> Result<u64> {
        let (start, end) = month_range(year, month)?;
        let now = Utc::now();

        let mut inserted = 0;
        let mut date = start;
        while date < end {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO daily_limits
                     (day_date, initial_limit, remaining, consumed, transaction_count,
                      version, created_at, updated_at)
                 VALUES (?1, ?2, ?2, 0, 0, 0, ?3, ?3)",
            )
            .bind(date)
            .bind(initial_limit)
            .bind(now)
            .execute(&self.pool)
            .await?;
            inserted += result.rows_affected();

            date = date.succ_opt().unwrap_or(end);
        }

        Ok(inserted)
    }

    /// Blind write-back from the cache: overwrite the three mutable fields
    /// and bump the version, no optimistic check, since the cache is the
    /// source of truth while a key is warmed. Returns the number of rows
    /// updated (0 when the date has no row).
    ///
    /// # Errors
    ///
    /// Returns a database error; in particular the conservation CHECK
    /// rejects a torn read pair, leaving the key dirty for the next tick.
    pub async fn sync_from_cache(
        &self,
        date: NaiveDate,
        remaining: i64,
        consumed: i64,
        transaction_count: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE daily_limits
                SET remaining = ?1,
                    consumed = ?2,
                    transaction_count = ?3,
                    version = version + 1,
                    updated_at = ?4
              WHERE day_date = ?5",
        )
        .bind(remaining)
        .bind(consumed)
        .bind(transaction_count)
        .bind(Utc::now())
        .bind(date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Direct consume: the baseline path that includes the database
    /// bottleneck. One conditional decrement, serialized by the database
    /// writer lock, so concurrent callers queue and every admitted
    /// decrement is safe.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub async fn consume_direct(&self, date: NaiveDate, amount: i64) -> Result<DirectConsume> {
        let remaining: Option<i64> = sqlx::query_scalar(
            "UPDATE daily_limits
                SET remaining = remaining - ?1,
                    consumed = consumed + ?1,
                    transaction_count = transaction_count + 1,
                    version = version + 1,
                    updated_at = ?2
              WHERE day_date = ?3 AND remaining >= ?1
          RETURNING remaining",
        )
        .bind(amount)
        .bind(Utc::now())
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(DirectConsume::Consumed { remaining });
        }

        // Zero rows: either the date has no row or the balance is short.
        let observed: Option<i64> =
            sqlx::query_scalar("SELECT remaining FROM daily_limits WHERE day_date = ?1")
                .bind(date)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match observed {
            Some(remaining) => DirectConsume::Insufficient { remaining },
            None => DirectConsume::NotFound,
        })
    }

    /// Rewrite every row of the month back to its initial value, or to
    /// `limit_override` when given (load testing). Returns the rows as
    /// written, for re-warming.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidMonth` for an out-of-range month, or a
    /// database error.
    pub async fn reset_month(
        &self,
        year: i32,
        month: u32,
        limit_override: Option<i64>,
    ) -> Result<Vec<DailyLimit>> {
        let (start, end) = month_range(year, month)?;
        let now = Utc::now();

        let result = if let Some(limit) = limit_override {
            sqlx::query(
                "UPDATE daily_limits
                    SET initial_limit = ?1, remaining = ?1, consumed = 0,
                        transaction_count = 0, version = version + 1, updated_at = ?2
                  WHERE day_date >= ?3 AND day_date < ?4",
            )
            .bind(limit)
            .bind(now)
            .bind(start)
            .bind(end)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                "UPDATE daily_limits
                    SET remaining = initial_limit, consumed = 0,
                        transaction_count = 0, version = version + 1, updated_at = ?1
                  WHERE day_date >= ?2 AND day_date < ?3",
            )
            .bind(now)
            .bind(start)
            .bind(end)
            .execute(&self.pool)
            .await?
        };

        tracing::info!(
            year,
            month,
            rows = result.rows_affected(),
            load_test = limit_override.is_some(),
            "Reset month limits"
        );

        self.find_by_month(year, month).await
    }
}

fn month_range(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let start =
        NaiveDate::from_ymd_opt(year, month, 1).ok_or(StoreError::InvalidMonth { year, month })?;
    let end = start
        .checked_add_months(Months::new(1))
        .ok_or(StoreError::InvalidMonth { year, month })?;
    Ok((start, end))
}

#[derive(sqlx::FromRow)]
struct LimitRow {
    day_date: NaiveDate,
    initial_limit: i64,
    remaining: i64,
    consumed: i64,
    transaction_count: i64,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LimitRow> for DailyLimit {
    fn from(row: LimitRow) -> Self {
        Self {
            day_date: row.day_date,
            initial_limit: row.initial_limit,
            remaining: row.remaining,
            consumed: row.consumed,
            transaction_count: row.transaction_count,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open_store() -> (RecordStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}/limits.db?mode=rwc", dir.path().display());
        let store = RecordStore::connect(&url).await.unwrap();
        (store, dir)
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn seed_and_find() {
        let (store, _dir) = open_store().await;

        let inserted = store.seed_month(2025, 3, 1_000_000).await.unwrap();
        assert_eq!(inserted, 31);

        // Seeding again inserts nothing.
        let inserted = store.seed_month(2025, 3, 1_000_000).await.unwrap();
        assert_eq!(inserted, 0);

        let limit = store.find_by_date(date("2025-03-15")).await.unwrap().unwrap();
        assert_eq!(limit.initial_limit, 1_000_000);
        assert_eq!(limit.remaining, 1_000_000);
        assert_eq!(limit.consumed, 0);

        assert!(store.find_by_date(date("2099-01-01")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_month_is_ordered() {
        let (store, _dir) = open_store().await;
        store.seed_month(2025, 2, 500).await.unwrap();

        let rows = store.find_by_month(2025, 2).await.unwrap();
        assert_eq!(rows.len(), 28);
        assert_eq!(rows.first().unwrap().day_date, date("2025-02-01"));
        assert_eq!(rows.last().unwrap().day_date, date("2025-02-28"));
        assert!(rows.windows(2).all(|w| w[0].day_date < w[1].day_date));
    }

    #[tokio::test]
    async fn invalid_month_rejected() {
        let (store, _dir) = open_store().await;
        let err = store.find_by_month(2025, 13).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidMonth { month: 13, .. }));
    }

    #[tokio::test]
    async fn direct_consume_paths() {
        let (store, _dir) = open_store().await;
        store.seed_month(2025, 3, 1000).await.unwrap();

        let outcome = store.consume_direct(date("2025-03-15"), 100).await.unwrap();
        assert_eq!(outcome, DirectConsume::Consumed { remaining: 900 });

        let outcome = store.consume_direct(date("2025-03-15"), 901).await.unwrap();
        assert_eq!(outcome, DirectConsume::Insufficient { remaining: 900 });

        let outcome = store.consume_direct(date("2099-01-01"), 1).await.unwrap();
        assert_eq!(outcome, DirectConsume::NotFound);

        let row = store.find_by_date(date("2025-03-15")).await.unwrap().unwrap();
        assert_eq!(row.remaining, 900);
        assert_eq!(row.consumed, 100);
        assert_eq!(row.transaction_count, 1);
        assert_eq!(row.version, 1);
        assert_eq!(row.initial_limit, row.remaining + row.consumed);
    }

    #[tokio::test]
    async fn concurrent_direct_consumes_all_admitted() {
        let (store, _dir) = open_store().await;
        store.seed_month(2025, 3, 1000).await.unwrap();
        let store = Arc::new(store);

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..100 {
            let store = store.clone();
            tasks.spawn(async move { store.consume_direct(date("2025-03-17"), 1).await.unwrap() });
        }

        let mut admitted = 0;
        while let Some(outcome) = tasks.join_next().await {
            if matches!(outcome.unwrap(), DirectConsume::Consumed { .. }) {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 100);

        let row = store.find_by_date(date("2025-03-17")).await.unwrap().unwrap();
        assert_eq!(row.remaining, 900);
        assert_eq!(row.consumed, 100);
        assert_eq!(row.transaction_count, 100);
    }

    #[tokio::test]
    async fn sync_from_cache_overwrites_and_bumps_version() {
        let (store, _dir) = open_store().await;
        store.seed_month(2025, 3, 1_000_000).await.unwrap();

        let updated = store
            .sync_from_cache(date("2025-03-15"), 999_900, 100, 1)
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let row = store.find_by_date(date("2025-03-15")).await.unwrap().unwrap();
        assert_eq!(row.remaining, 999_900);
        assert_eq!(row.consumed, 100);
        assert_eq!(row.transaction_count, 1);
        assert_eq!(row.version, 1);

        // No row for the date: nothing updated.
        let updated = store
            .sync_from_cache(date("2099-01-01"), 1, 0, 0)
            .await
            .unwrap();
        assert_eq!(updated, 0);
    }

    #[tokio::test]
    async fn sync_from_cache_rejects_torn_pair() {
        let (store, _dir) = open_store().await;
        store.seed_month(2025, 3, 1000).await.unwrap();

        // remaining + consumed != initial_limit: the CHECK rejects it.
        let result = store.sync_from_cache(date("2025-03-15"), 950, 100, 1).await;
        assert!(result.is_err());

        let row = store.find_by_date(date("2025-03-15")).await.unwrap().unwrap();
        assert_eq!(row.remaining, 1000);
        assert_eq!(row.consumed, 0);
    }

    #[tokio::test]
    async fn reset_month_restores_initial_values() {
        let (store, _dir) = open_store().await;
        store.seed_month(2025, 3, 1000).await.unwrap();
        store.consume_direct(date("2025-03-15"), 400).await.unwrap();

        let rows = store.reset_month(2025, 3, None).await.unwrap();
        assert_eq!(rows.len(), 31);
        assert!(rows.iter().all(|r| r.remaining == 1000
            && r.consumed == 0
            && r.transaction_count == 0
            && r.initial_limit == 1000));
    }

    #[tokio::test]
    async fn reset_month_with_override() {
        let (store, _dir) = open_store().await;
        store.seed_month(2025, 3, 1000).await.unwrap();

        let rows = store.reset_month(2025, 3, Some(999_999_999)).await.unwrap();
        assert!(rows
            .iter()
            .all(|r| r.initial_limit == 999_999_999 && r.remaining == 999_999_999));
    }
}
