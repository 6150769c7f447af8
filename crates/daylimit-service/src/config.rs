//! Service configuration.

use std::time::Duration;

use daylimit_engine::SyncConfig;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// SQLite URL for the record store (default: "sqlite:daylimit.db?mode=rwc").
    pub database_url: String,

    /// Redis URL for the fast store. Unset means the in-process memory
    /// backend (single instance only).
    pub redis_url: Option<String>,

    /// Whether the cached consume path is enabled.
    pub cache_enabled: bool,

    /// Fast-store key prefix.
    pub cache_key_prefix: String,

    /// Fast-store entry TTL, in hours.
    pub cache_ttl_hours: u64,

    /// Whether the scheduled sync loop runs.
    pub sync_enabled: bool,

    /// Seconds between scheduled sync runs.
    pub sync_interval_seconds: u64,

    /// Keys per batch within a sync run.
    pub sync_batch_size: usize,

    /// Write attempts per key before a sync run gives up on it.
    pub sync_retry_attempts: u32,

    /// Run a sync right after the startup warm.
    pub sync_on_startup: bool,

    /// Seed the current month's rows at startup.
    pub seed_on_startup: bool,

    /// Initial limit for seeded rows, in minor-currency units.
    pub seed_daily_limit: i64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:daylimit.db?mode=rwc".into()),
            redis_url: std::env::var("REDIS_URL").ok(),
            cache_enabled: env_parse("CACHE_ENABLED", true),
            cache_key_prefix: std::env::var("CACHE_KEY_PREFIX").unwrap_or_else(|_| "limits".into()),
            cache_ttl_hours: env_parse("CACHE_TTL_HOURS", 24),
            sync_enabled: env_parse("SYNC_ENABLED", true),
            sync_interval_seconds: env_parse("SYNC_INTERVAL_SECONDS", 5),
            sync_batch_size: env_parse("SYNC_BATCH_SIZE", 100),
            sync_retry_attempts: env_parse("SYNC_RETRY_ATTEMPTS", 3),
            sync_on_startup: env_parse("SYNC_ON_STARTUP", false),
            seed_on_startup: env_parse("SEED_ON_STARTUP", true),
            seed_daily_limit: env_parse("SEED_DAILY_LIMIT", 10_000_000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES", 1024 * 1024),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS", 30),
        }
    }

    /// Fast-store entry TTL as a duration.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours * 3600)
    }

    /// The sync worker configuration slice.
    #[must_use]
    pub const fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            enabled: self.sync_enabled,
            interval: Duration::from_secs(self.sync_interval_seconds),
            batch_size: self.sync_batch_size,
            retry_attempts: self.sync_retry_attempts,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: "sqlite:daylimit.db?mode=rwc".into(),
            redis_url: None,
            cache_enabled: true,
            cache_key_prefix: "limits".into(),
            cache_ttl_hours: 24,
            sync_enabled: true,
            sync_interval_seconds: 5,
            sync_batch_size: 100,
            sync_retry_attempts: 3,
            sync_on_startup: false,
            seed_on_startup: true,
            seed_daily_limit: 10_000_000,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let config = ServiceConfig::default();
        assert!(config.cache_enabled);
        assert_eq!(config.cache_key_prefix, "limits");
        assert_eq!(config.cache_ttl_hours, 24);
        assert!(config.sync_enabled);
        assert_eq!(config.sync_interval_seconds, 5);
        assert_eq!(config.sync_batch_size, 100);
        assert_eq!(config.sync_retry_attempts, 3);
    }

    #[test]
    fn sync_config_slice() {
        let config = ServiceConfig::default();
        let sync = config.sync_config();
        assert_eq!(sync.interval, Duration::from_secs(5));
        assert_eq!(sync.batch_size, 100);
        assert_eq!(sync.retry_attempts, 3);
    }
}
