//! Cache management handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Month selector for warm/reset endpoints. Defaults to the current
/// month when omitted.
#[derive(Debug, Deserialize)]
pub struct MonthParams {
    /// Year (e.g. 2025).
    pub year: Option<i32>,
    /// Month (1-12).
    pub month: Option<u32>,
}

impl MonthParams {
    /// Resolve to concrete values, defaulting to today.
    #[must_use]
    pub fn resolve(&self) -> (i32, u32) {
        let today = Utc::now().date_naive();
        (
            self.year.unwrap_or_else(|| today.year()),
            self.month.unwrap_or_else(|| today.month()),
        )
    }
}

/// Warm response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmResponse {
    /// Warmed year.
    pub year: i32,
    /// Warmed month.
    pub month: u32,
    /// Entries loaded into the fast store.
    pub records_cached: usize,
}

/// Warm a month from the record store into the fast store.
pub async fn warm(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MonthParams>,
) -> Result<Json<WarmResponse>, ApiError> {
    let (year, month) = params.resolve();
    let records_cached = state.engine.warm_month(year, month).await?;

    Ok(Json(WarmResponse {
        year,
        month,
        records_cached,
    }))
}

/// Clear response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    /// Keys removed from the fast store.
    pub keys_removed: u64,
}

/// Drop every cached entry and forget all dirty marks.
pub async fn clear(State(state): State<Arc<AppState>>) -> Result<Json<ClearResponse>, ApiError> {
    let keys_removed = state.engine.clear_cache().await?;
    Ok(Json(ClearResponse { keys_removed }))
}

/// Cache stats response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsResponse {
    /// Whether the cached path is enabled.
    pub enabled: bool,
    /// Keys pending sync.
    pub dirty_keys: usize,
    /// Configured key prefix.
    pub key_prefix: String,
    /// Configured entry TTL, in hours.
    pub ttl_hours: u64,
    /// Consume script hits since startup.
    pub hits: u64,
    /// Consume script misses since startup.
    pub misses: u64,
    /// hits / (hits + misses).
    pub hit_ratio: f64,
    /// Backend identifier (`redis` or `memory`).
    pub backend: String,
    /// Keys held by the backend, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_count: Option<u64>,
    /// Backend memory usage, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_memory: Option<String>,
}

/// Get cache statistics.
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<CacheStatsResponse> {
    let stats = state.engine.cache_stats().await;

    Json(CacheStatsResponse {
        enabled: stats.enabled,
        dirty_keys: stats.dirty_keys,
        key_prefix: stats.key_prefix,
        ttl_hours: stats.ttl_hours,
        hits: stats.hits,
        misses: stats.misses,
        hit_ratio: stats.hit_ratio,
        backend: stats.backend.to_string(),
        entry_count: stats.entry_count,
        used_memory: stats.used_memory,
    })
}
