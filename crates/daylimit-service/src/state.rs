//! Application state.

use std::sync::Arc;

use daylimit_engine::{LimitEngine, SyncWorker};
use daylimit_store::RecordStore;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The limit engine.
    pub engine: Arc<LimitEngine>,

    /// The sync worker (also serves manual triggers and stats).
    pub sync: Arc<SyncWorker>,

    /// The record store (admin seeding and direct queries).
    pub record: Arc<RecordStore>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        engine: Arc<LimitEngine>,
        sync: Arc<SyncWorker>,
        record: Arc<RecordStore>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            engine,
            sync,
            record,
            config,
        }
    }
}
