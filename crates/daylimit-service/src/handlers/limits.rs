//! Limit query handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use daylimit_engine::{LimitView, MonthView};

use crate::error::ApiError;
use crate::state::AppState;

/// One day's limit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitResponse {
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
    /// Which tier served the read: `CACHE` or `DATABASE`.
    pub source: String,
}

impl From<LimitView> for LimitResponse {
    fn from(view: LimitView) -> Self {
        Self {
            date: view.date,
            initial_limit: view.initial_limit,
            remaining: view.remaining,
            consumed: view.consumed,
            transaction_count: view.transaction_count,
            utilization_percent: view.utilization_percent,
            source: view.source.as_str().to_string(),
        }
    }
}

/// A month of limits with aggregate totals.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyLimitsResponse {
    /// Requested year.
    pub year: i32,
    /// Requested month.
    pub month: u32,
    /// Per-day limits, ordered by date.
    pub limits: Vec<LimitResponse>,
    /// Sum of initial limits.
    pub total_initial_limit: i64,
    /// Sum of remaining amounts.
    pub total_remaining: i64,
    /// Sum of consumed amounts.
    pub total_consumed: i64,
    /// Mean utilization across the month.
    pub avg_utilization_percent: f64,
}

impl From<MonthView> for MonthlyLimitsResponse {
    fn from(view: MonthView) -> Self {
        Self {
            year: view.year,
            month: view.month,
            limits: view.limits.into_iter().map(Into::into).collect(),
            total_initial_limit: view.total_initial_limit,
            total_remaining: view.total_remaining,
            total_consumed: view.total_consumed,
            avg_utilization_percent: view.avg_utilization_percent,
        }
    }
}

/// Get all limits for a month.
pub async fn get_month(
    State(state): State<Arc<AppState>>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<MonthlyLimitsResponse>, ApiError> {
    let view = state.engine.get_month(year, month).await?;
    Ok(Json(view.into()))
}

/// Get the limit for a specific day.
pub async fn get_day(
    State(state): State<Arc<AppState>>,
    Path((year, month, day)): Path<(i32, u32, u32)>,
) -> Result<Json<LimitResponse>, ApiError> {
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid date: {year}-{month:02}-{day:02}")))?;

    limit_for(&state, date).await
}

/// Get today's limit.
pub async fn get_today(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LimitResponse>, ApiError> {
    limit_for(&state, Utc::now().date_naive()).await
}

async fn limit_for(state: &AppState, date: NaiveDate) -> Result<Json<LimitResponse>, ApiError> {
    let view = state
        .engine
        .get_limit(date)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no limit for {date}")))?;
    Ok(Json(view.into()))
}
