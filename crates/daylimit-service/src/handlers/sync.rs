//! Sync trigger and stats handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use daylimit_core::SyncType;

use crate::error::ApiError;
use crate::state::AppState;

/// Manual sync response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    /// Whether the run completed fully successfully.
    pub success: bool,
    /// Keys written back.
    pub records_synced: usize,
    /// Run duration in milliseconds.
    pub duration_ms: u64,
    /// Run summary.
    pub message: String,
    /// When the trigger returned.
    pub synced_at: DateTime<Utc>,
}

/// Trigger a sync run now.
pub async fn trigger(State(state): State<Arc<AppState>>) -> Json<SyncResponse> {
    let report = state.sync.run_once(SyncType::Manual).await;

    Json(SyncResponse {
        success: report.ran && report.status == daylimit_core::SyncStatus::Success,
        records_synced: report.records_synced,
        duration_ms: report.duration_ms,
        message: report.message,
        synced_at: Utc::now(),
    })
}

/// Sync stats response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatsResponse {
    /// Whether the scheduled loop runs.
    pub enabled: bool,
    /// Seconds between scheduled runs.
    pub interval_seconds: u64,
    /// When the last completed run finished.
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Records written by the last completed run.
    pub last_sync_record_count: u64,
    /// Keys currently pending sync.
    pub dirty_keys_count: usize,
    /// Failed runs since the last completed run.
    pub consecutive_failures: u32,
    /// Fully successful runs in the last hour.
    pub total_syncs_last_hour: i64,
    /// Mean run duration in the last hour.
    pub avg_duration_ms: f64,
    /// Records written back in the last hour.
    pub total_records_synced_last_hour: i64,
}

/// Get sync statistics.
pub async fn stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SyncStatsResponse>, ApiError> {
    let stats = state.sync.stats().await?;

    Ok(Json(SyncStatsResponse {
        enabled: stats.enabled,
        interval_seconds: stats.interval_seconds,
        last_sync_time: stats.last_sync_time,
        last_sync_record_count: stats.last_sync_record_count,
        dirty_keys_count: stats.dirty_keys,
        consecutive_failures: stats.consecutive_failures,
        total_syncs_last_hour: stats.total_syncs_last_hour,
        avg_duration_ms: stats.avg_duration_ms,
        total_records_synced_last_hour: stats.total_records_synced_last_hour,
    }))
}
