//! Common test utilities for daylimit integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_test::TestServer;
use tempfile::TempDir;

use daylimit_cache::{DirtySet, MemoryCache};
use daylimit_engine::{LimitEngine, SyncWorker};
use daylimit_service::{create_router, AppState, ServiceConfig};
use daylimit_store::RecordStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The limit engine, for direct assertions.
    pub engine: Arc<LimitEngine>,
    /// The record store, for seeding and direct assertions.
    pub record: Arc<RecordStore>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
}

impl TestHarness {
    /// Create a new test harness with a fresh database and an in-process
    /// fast store.
    pub async fn new() -> Self {
        Self::with_cache_enabled(true).await
    }

    /// Create a harness with the cached path toggled.
    pub async fn with_cache_enabled(cache_enabled: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let url = format!("sqlite:{}/limits.db?mode=rwc", temp_dir.path().display());
        let record = Arc::new(
            RecordStore::connect(&url)
                .await
                .expect("Failed to open record store"),
        );

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            database_url: url,
            redis_url: None,
            cache_enabled,
            seed_on_startup: false,
            ..ServiceConfig::default()
        };

        // Engine and worker share one fast store and one dirty set.
        let cache = Arc::new(MemoryCache::new(
            config.cache_key_prefix.clone(),
            Duration::from_secs(3600),
        ));
        let dirty = Arc::new(DirtySet::new());
        let engine = Arc::new(LimitEngine::new(
            record.clone(),
            cache.clone(),
            dirty.clone(),
            cache_enabled,
        ));
        let sync = SyncWorker::new(record.clone(), cache, dirty, config.sync_config());

        let state = AppState::new(engine.clone(), sync, record.clone(), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            engine,
            record,
            _temp_dir: temp_dir,
        }
    }

    /// Seed a month of limits directly in the record store.
    pub async fn seed_month(&self, year: i32, month: u32, initial_limit: i64) {
        self.record
            .seed_month(year, month, initial_limit)
            .await
            .expect("Failed to seed month");
    }
}
