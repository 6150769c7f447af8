//! Consume handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use daylimit_core::ConsumeOutcome;

use crate::error::ApiError;
use crate::state::AppState;

/// Consume request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeRequest {
    /// Date to consume against. Defaults to today.
    pub date: Option<NaiveDate>,
    /// Amount to consume, in minor-currency units. Must be positive.
    pub amount: i64,
    /// Caller-supplied transaction id, echoed back. Generated if absent.
    pub transaction_id: Option<String>,
    /// Bypass the cache and consume against the record store.
    #[serde(default)]
    pub force_direct_db: bool,
}

/// Consume response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeResponse {
    /// Whether the decrement was admitted.
    pub success: bool,
    /// The (possibly generated) transaction id.
    pub transaction_id: String,
    /// The date consumed against.
    pub date: NaiveDate,
    /// Amount actually consumed (0 on rejection).
    pub amount_consumed: i64,
    /// Balance after the call.
    pub remaining_limit: i64,
    /// Which tier served the call: `CACHE` or `DATABASE`.
    pub source: String,
    /// Measured latency in milliseconds.
    pub latency_ms: u64,
    /// Canonical outcome message.
    pub message: String,
}

/// Consume a date's limit.
pub async fn consume(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ConsumeRequest>,
) -> Result<Json<ConsumeResponse>, ApiError> {
    if body.amount <= 0 {
        return Err(ApiError::BadRequest("amount must be positive".into()));
    }

    let date = body.date.unwrap_or_else(|| Utc::now().date_naive());
    let transaction_id = body
        .transaction_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let outcome = state
        .engine
        .consume(date, body.amount, body.force_direct_db)
        .await;

    tracing::debug!(
        date = %date,
        amount = body.amount,
        transaction_id = %transaction_id,
        success = outcome.is_success(),
        source = outcome.source.as_str(),
        "Consume processed"
    );

    Ok(Json(to_response(
        outcome,
        transaction_id,
        date,
        body.amount,
    )))
}

/// Batch consume request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConsumeRequest {
    /// Transactions to apply, in order.
    pub transactions: Vec<ConsumeRequest>,
}

/// Batch consume response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConsumeResponse {
    /// Number of transactions submitted.
    pub total_requests: usize,
    /// Number admitted.
    pub success_count: usize,
    /// Number rejected or failed.
    pub failed_count: usize,
}

/// Consume limits in batch.
pub async fn consume_batch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BatchConsumeRequest>,
) -> Result<Json<BatchConsumeResponse>, ApiError> {
    let total_requests = body.transactions.len();
    let mut success_count = 0;
    let mut failed_count = 0;

    for request in body.transactions {
        if request.amount <= 0 {
            failed_count += 1;
            continue;
        }
        let date = request.date.unwrap_or_else(|| Utc::now().date_naive());
        let outcome = state
            .engine
            .consume(date, request.amount, request.force_direct_db)
            .await;
        if outcome.is_success() {
            success_count += 1;
        } else {
            failed_count += 1;
        }
    }

    Ok(Json(BatchConsumeResponse {
        total_requests,
        success_count,
        failed_count,
    }))
}

#[allow(clippy::cast_possible_truncation)]
fn to_response(
    outcome: ConsumeOutcome,
    transaction_id: String,
    date: NaiveDate,
    amount: i64,
) -> ConsumeResponse {
    let success = outcome.is_success();
    ConsumeResponse {
        success,
        transaction_id,
        date,
        amount_consumed: if success { amount } else { 0 },
        remaining_limit: outcome.remaining,
        source: outcome.source.as_str().to_string(),
        latency_ms: outcome.latency.as_millis() as u64,
        message: outcome.status.message(),
    }
}
