//! Sync history persistence.

use chrono::{DateTime, Utc};
use daylimit_core::{SyncRecord, SyncStatus, SyncType};

use crate::error::Result;
use crate::record::RecordStore;

/// Aggregates over a window of sync history, for the stats endpoint.
#[derive(Debug, Clone, Default)]
pub struct SyncAggregates {
    /// Number of fully successful runs in the window.
    pub successful_syncs: i64,
    /// Mean run duration across all runs in the window.
    pub avg_duration_ms: f64,
    /// Total records written back across all runs in the window.
    pub total_records_synced: i64,
}

impl RecordStore {
    /// Append one sync history row. Returns the row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_sync_record(&self, record: &SyncRecord) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO sync_history
                 (sync_type, records_synced, duration_ms, status, error_message,
                  started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
          RETURNING id",
        )
        .bind(record.sync_type.as_str())
        .bind(record.records_synced)
        .bind(record.duration_ms)
        .bind(record.status.as_str())
        .bind(record.error_message.as_deref())
        .bind(record.started_at)
        .bind(record.completed_at)
        .fetch_one(self.pool())
        .await?;

        Ok(id)
    }

    /// Aggregate sync history started at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn sync_stats_since(&self, since: DateTime<Utc>) -> Result<SyncAggregates> {
        let (successful_syncs, avg_duration_ms, total_records_synced): (i64, f64, i64) =
            sqlx::query_as(
                "SELECT COUNT(CASE WHEN status = 'SUCCESS' THEN 1 END),
                        COALESCE(AVG(duration_ms), 0.0),
                        COALESCE(SUM(records_synced), 0)
                   FROM sync_history
                  WHERE started_at >= ?1",
            )
            .bind(since)
            .fetch_one(self.pool())
            .await?;

        Ok(SyncAggregates {
            successful_syncs,
            avg_duration_ms,
            total_records_synced,
        })
    }

    /// The most recent sync rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn recent_sync_records(&self, limit: i64) -> Result<Vec<SyncRecord>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT id, sync_type, records_synced, duration_ms, status, error_message,
                    started_at, completed_at
               FROM sync_history
              ORDER BY id DESC
              LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: i64,
    sync_type: String,
    records_synced: i64,
    duration_ms: Option<i64>,
    status: String,
    error_message: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<HistoryRow> for SyncRecord {
    fn from(row: HistoryRow) -> Self {
        Self {
            id: Some(row.id),
            sync_type: row.sync_type.parse().unwrap_or(SyncType::Scheduled),
            records_synced: row.records_synced,
            duration_ms: row.duration_ms,
            status: row.status.parse().unwrap_or(SyncStatus::Failed),
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
        }
    }
}
