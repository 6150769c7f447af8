//! Daylimit Service - HTTP API for the write-behind daily-limit cache.
//!
//! This is the main entry point for the daylimit service.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use daylimit_cache::{DirtySet, FastStore, MemoryCache, RedisCache};
use daylimit_core::SyncType;
use daylimit_engine::{LimitEngine, SyncWorker};
use daylimit_service::{create_router, AppState, ServiceConfig};
use daylimit_store::RecordStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,daylimit=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Daylimit Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        database_url = %config.database_url,
        redis_configured = %config.redis_url.is_some(),
        cache_enabled = %config.cache_enabled,
        sync_enabled = %config.sync_enabled,
        sync_interval_seconds = %config.sync_interval_seconds,
        "Service configuration loaded"
    );

    // Open the record store
    tracing::info!(url = %config.database_url, "Opening record store");
    let record = Arc::new(RecordStore::connect(&config.database_url).await?);

    // Open the fast store: Redis when configured, in-process otherwise.
    // With the cache enabled, an unreachable Redis is a startup failure.
    let cache: Arc<dyn FastStore> = match &config.redis_url {
        Some(url) => {
            tracing::info!(url = %url, "Connecting to Redis fast store");
            Arc::new(RedisCache::connect(url, config.cache_key_prefix.clone(), config.cache_ttl()).await?)
        }
        None => {
            tracing::warn!("No REDIS_URL configured - using in-process fast store (single instance only)");
            Arc::new(MemoryCache::new(
                config.cache_key_prefix.clone(),
                config.cache_ttl(),
            ))
        }
    };

    let dirty = Arc::new(DirtySet::new());
    let engine = Arc::new(LimitEngine::new(
        record.clone(),
        cache.clone(),
        dirty.clone(),
        config.cache_enabled,
    ));
    let sync = SyncWorker::new(record.clone(), cache, dirty, config.sync_config());

    // Seed the current month so the demo has rows to consume.
    if config.seed_on_startup {
        let today = Utc::now().date_naive();
        let seeded = record
            .seed_month(today.year(), today.month(), config.seed_daily_limit)
            .await?;
        if seeded > 0 {
            tracing::info!(seeded, limit = config.seed_daily_limit, "Seeded current month");
        }
    }

    // Warm the cache and optionally flush once before taking traffic.
    if config.cache_enabled {
        let warmed = engine.warm_current_month().await?;
        tracing::info!(warmed, "Startup warm complete");

        if config.sync_on_startup {
            let report = sync.run_once(SyncType::Startup).await;
            tracing::info!(records = report.records_synced, "Startup sync complete");
        }
    }

    // Start the scheduled sync loop.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sync_handle = if config.sync_enabled && config.cache_enabled {
        Some(sync.spawn(shutdown_rx))
    } else {
        tracing::warn!("Scheduled sync disabled");
        None
    };

    // Build app state and router
    let state = AppState::new(engine, sync.clone(), record, config.clone());
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the loop, then run the final blocking flush.
    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(true);
    if let Some(handle) = sync_handle {
        let _ = handle.await;
    }
    if config.sync_enabled && config.cache_enabled {
        let report = sync.run_once(SyncType::Shutdown).await;
        tracing::info!(
            records = report.records_synced,
            status = %report.status,
            "Shutdown sync complete"
        );
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown signal handler");
    }
}
