//! In-process fast store.
//!
//! Backs the [`FastStore`] contract with plain maps behind one mutex, so
//! the consume check-and-decrement is atomic exactly the way the Redis
//! script is. This is the default backend when no Redis URL is configured
//! (single instance only) and the backend the test suite exercises.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use daylimit_core::{DailyLimit, LimitCacheEntry};

use crate::error::{CacheError, CacheResult};
use crate::keys::{self, meta_field};
use crate::{FastStore, ScriptOutcome, ServerInfo};

struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, Expiring<String>>,
    hashes: HashMap<String, Expiring<HashMap<String, String>>>,
}

/// In-process [`FastStore`] implementation.
pub struct MemoryCache {
    prefix: String,
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl MemoryCache {
    /// Create an empty store with the given key prefix and entry TTL.
    #[must_use]
    pub fn new(prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            ttl,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn parse_i64(key: &str, value: &str) -> CacheResult<i64> {
        value.parse().map_err(|_| CacheError::Malformed {
            key: key.to_string(),
            detail: format!("expected integer, got {value:?}"),
        })
    }
}

#[async_trait]
impl FastStore for MemoryCache {
    async fn warm(&self, limit: &DailyLimit) -> CacheResult<()> {
        let remaining_key = keys::remaining_key(&self.prefix, limit.day_date);
        let meta_key = keys::meta_key(&self.prefix, limit.day_date);
        let expires_at = Instant::now() + self.ttl;

        let mut meta = HashMap::new();
        meta.insert(
            meta_field::INITIAL_LIMIT.to_string(),
            limit.initial_limit.to_string(),
        );
        meta.insert(meta_field::CONSUMED.to_string(), limit.consumed.to_string());
        meta.insert(
            meta_field::TRANSACTION_COUNT.to_string(),
            limit.transaction_count.to_string(),
        );
        meta.insert(meta_field::VERSION.to_string(), limit.version.to_string());
        meta.insert(meta_field::DAY_DATE.to_string(), limit.day_date.to_string());

        let mut inner = self.lock();
        inner.strings.insert(
            remaining_key,
            Expiring {
                value: limit.remaining.to_string(),
                expires_at,
            },
        );
        inner.hashes.insert(
            meta_key,
            Expiring {
                value: meta,
                expires_at,
            },
        );
        Ok(())
    }

    async fn consume(&self, date: NaiveDate, amount: i64) -> CacheResult<ScriptOutcome> {
        let remaining_key = keys::remaining_key(&self.prefix, date);
        let meta_key = keys::meta_key(&self.prefix, date);

        // Single lock section = the script's atomicity guarantee.
        let mut inner = self.lock();

        let remaining = match inner.strings.get(&remaining_key) {
            Some(entry) if entry.live() => Self::parse_i64(&remaining_key, &entry.value)?,
            _ => return Ok(ScriptOutcome::Missing),
        };

        if remaining < amount {
            return Ok(ScriptOutcome::Insufficient { remaining });
        }

        let new_remaining = remaining - amount;
        if let Some(entry) = inner.strings.get_mut(&remaining_key) {
            entry.value = new_remaining.to_string();
        }
        if let Some(entry) = inner.hashes.get_mut(&meta_key) {
            for (field, bump) in [(meta_field::CONSUMED, amount), (meta_field::TRANSACTION_COUNT, 1)]
            {
                let current = entry
                    .value
                    .get(field)
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(0);
                entry
                    .value
                    .insert(field.to_string(), (current + bump).to_string());
            }
        }

        Ok(ScriptOutcome::Consumed {
            remaining: new_remaining,
        })
    }

    async fn read_entry(&self, date: NaiveDate) -> CacheResult<Option<LimitCacheEntry>> {
        let remaining_key = keys::remaining_key(&self.prefix, date);
        let meta_key = keys::meta_key(&self.prefix, date);

        let inner = self.lock();

        let remaining = match inner.strings.get(&remaining_key) {
            Some(entry) if entry.live() => Self::parse_i64(&remaining_key, &entry.value)?,
            _ => return Ok(None),
        };

        let meta = inner
            .hashes
            .get(&meta_key)
            .filter(|entry| entry.live())
            .map(|entry| &entry.value);

        let field = |name: &str| -> i64 {
            meta.and_then(|m| m.get(name))
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)
        };

        Ok(Some(LimitCacheEntry {
            day_date: date,
            initial_limit: field(meta_field::INITIAL_LIMIT),
            remaining,
            consumed: field(meta_field::CONSUMED),
            transaction_count: field(meta_field::TRANSACTION_COUNT),
            version: field(meta_field::VERSION),
        }))
    }

    async fn clear_all(&self) -> CacheResult<u64> {
        let prefix = format!("{}:", self.prefix);
        let mut inner = self.lock();
        let before = inner.strings.len() + inner.hashes.len();
        inner.strings.retain(|k, _| !k.starts_with(&prefix));
        inner.hashes.retain(|k, _| !k.starts_with(&prefix));
        let removed = before - inner.strings.len() - inner.hashes.len();
        Ok(removed as u64)
    }

    async fn server_info(&self) -> CacheResult<ServerInfo> {
        let inner = self.lock();
        let count = inner.strings.values().filter(|e| e.live()).count()
            + inner.hashes.values().filter(|e| e.live()).count();
        Ok(ServerInfo {
            backend: "memory",
            key_prefix: self.prefix.clone(),
            ttl: self.ttl,
            entry_count: Some(count as u64),
            used_memory: None,
        })
    }

    fn remaining_key(&self, date: NaiveDate) -> String {
        keys::remaining_key(&self.prefix, date)
    }
}
