//! Daylimit HTTP API service.
//!
//! This crate provides the HTTP surface over the limit engine and sync
//! worker:
//!
//! - Consume (single and batch)
//! - Limit queries (day, month, today)
//! - Cache management (warm, clear, stats)
//! - Sync trigger and stats
//! - Admin reset and system status

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Axum handlers all return Result; per-handler error docs add nothing.
#![allow(clippy::missing_errors_doc)]
// Some handlers are async only because Axum requires it.
#![allow(clippy::unused_async)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
