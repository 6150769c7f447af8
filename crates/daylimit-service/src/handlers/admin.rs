//! Admin handlers: resets and system status.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ApiError;
use crate::handlers::cache::MonthParams;
use crate::state::AppState;

/// Reset response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    /// Reset year.
    pub year: i32,
    /// Reset month.
    pub month: u32,
    /// Rows rewritten.
    pub records_reset: usize,
    /// Whether the load-test limit was applied.
    pub load_test: bool,
}

/// Reset a month to its initial values and re-warm it.
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MonthParams>,
) -> Result<Json<ResetResponse>, ApiError> {
    run_reset(&state, &params, false).await
}

/// Reset a month to the load-test limit so it cannot exhaust mid-test.
pub async fn reset_load_test(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MonthParams>,
) -> Result<Json<ResetResponse>, ApiError> {
    run_reset(&state, &params, true).await
}

async fn run_reset(
    state: &AppState,
    params: &MonthParams,
    load_test: bool,
) -> Result<Json<ResetResponse>, ApiError> {
    let (year, month) = params.resolve();
    let records_reset = state.engine.reset_month(year, month, load_test).await?;

    tracing::info!(year, month, records_reset, load_test, "Limits reset");

    Ok(Json(ResetResponse {
        year,
        month,
        records_reset,
        load_test,
    }))
}

/// System status response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Whether the cached consume path is enabled.
    pub cache_enabled: bool,
    /// Whether the sync worker is healthy.
    pub sync_healthy: bool,
    /// Server time.
    pub timestamp: DateTime<Utc>,
}

/// Get system status.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        cache_enabled: state.engine.cache_enabled(),
        sync_healthy: state.sync.healthy(),
        timestamp: Utc::now(),
    })
}
