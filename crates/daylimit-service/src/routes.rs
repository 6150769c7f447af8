//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, cache, consume, health, limits, sync};
use crate::state::AppState;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Consume
/// - `POST /consume` - Consume a date's limit
/// - `POST /consume/batch` - Consume in batch
///
/// ## Limits
/// - `GET /limits/{year}/{month}` - All limits for a month
/// - `GET /limits/{year}/{month}/{day}` - One day's limit
/// - `GET /limits/today` - Today's limit
///
/// ## Cache
/// - `POST /cache/warm` - Warm a month into the fast store
/// - `POST /cache/clear` - Drop all cached entries
/// - `GET /cache/stats` - Cache counters
///
/// ## Sync
/// - `POST /sync` - Trigger a sync run now
/// - `GET /sync/stats` - Sync statistics
///
/// ## Admin
/// - `POST /reset` - Reset a month to initial values
/// - `POST /reset/load-test` - Reset a month to the load-test limit
/// - `GET /status` - Cache/sync health summary
/// - `GET /health` - Liveness check
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // Consume
        .route("/consume", post(consume::consume))
        .route("/consume/batch", post(consume::consume_batch))
        // Limits
        .route("/limits/today", get(limits::get_today))
        .route("/limits/{year}/{month}", get(limits::get_month))
        .route("/limits/{year}/{month}/{day}", get(limits::get_day))
        // Cache management
        .route("/cache/warm", post(cache::warm))
        .route("/cache/clear", post(cache::clear))
        .route("/cache/stats", get(cache::stats))
        // Sync
        .route("/sync", post(sync::trigger))
        .route("/sync/stats", get(sync::stats))
        // Admin
        .route("/reset", post(admin::reset))
        .route("/reset/load-test", post(admin::reset_load_test))
        .route("/status", get(admin::status))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
