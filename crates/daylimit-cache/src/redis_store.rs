//! Redis-backed fast store.
//!
//! The consume path is a single Lua script: Redis serializes scripts
//! against all other commands on the touched keys, which is the whole
//! reason the cache tier can admit decrements without locks.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use daylimit_core::{DailyLimit, LimitCacheEntry};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use crate::error::{CacheError, CacheResult};
use crate::keys::{self, meta_field};
use crate::{FastStore, ScriptOutcome, ServerInfo};

/// Atomic consume: check the scalar balance, decrement it, and bump the
/// metadata counters in one server-side unit.
///
/// Returns `{-1, 0}` when the remaining key is absent, `{0, remaining}`
/// when the balance does not cover the amount, `{1, new_remaining}` on
/// success.
const CONSUME_SCRIPT: &str = r"
local remaining = redis.call('GET', KEYS[1])
if remaining == false then
    return {-1, 0}
end
remaining = tonumber(remaining)
local amount = tonumber(ARGV[1])
if remaining < amount then
    return {0, remaining}
end
local newRemaining = redis.call('DECRBY', KEYS[1], amount)
redis.call('HINCRBY', KEYS[2], 'consumed', amount)
redis.call('HINCRBY', KEYS[2], 'transaction_count', 1)
return {1, newRemaining}
";

/// Redis implementation of [`FastStore`].
pub struct RedisCache {
    conn: ConnectionManager,
    script: Script,
    prefix: String,
    ttl: Duration,
}

impl RedisCache {
    /// Connect to Redis and prepare the consume script.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is invalid or the initial connection
    /// cannot be established.
    pub async fn connect(url: &str, prefix: impl Into<String>, ttl: Duration) -> CacheResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Connection(format!("invalid redis url: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self {
            conn,
            script: Script::new(CONSUME_SCRIPT),
            prefix: prefix.into(),
            ttl,
        })
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

#[async_trait]
impl FastStore for RedisCache {
    async fn warm(&self, limit: &DailyLimit) -> CacheResult<()> {
        let remaining_key = keys::remaining_key(&self.prefix, limit.day_date);
        let meta_key = keys::meta_key(&self.prefix, limit.day_date);
        let mut conn = self.conn.clone();

        let meta: [(&str, String); 5] = [
            (meta_field::INITIAL_LIMIT, limit.initial_limit.to_string()),
            (meta_field::CONSUMED, limit.consumed.to_string()),
            (
                meta_field::TRANSACTION_COUNT,
                limit.transaction_count.to_string(),
            ),
            (meta_field::VERSION, limit.version.to_string()),
            (meta_field::DAY_DATE, limit.day_date.to_string()),
        ];

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set_ex(&remaining_key, limit.remaining.to_string(), self.ttl_secs())
            .ignore()
            .del(&meta_key)
            .ignore()
            .hset_multiple(&meta_key, &meta)
            .ignore()
            .expire(&meta_key, i64::try_from(self.ttl_secs()).unwrap_or(i64::MAX))
            .ignore();
        let () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn consume(&self, date: NaiveDate, amount: i64) -> CacheResult<ScriptOutcome> {
        let remaining_key = keys::remaining_key(&self.prefix, date);
        let meta_key = keys::meta_key(&self.prefix, date);
        let mut conn = self.conn.clone();

        let (status, remaining): (i64, i64) = self
            .script
            .key(&remaining_key)
            .key(&meta_key)
            .arg(amount)
            .invoke_async(&mut conn)
            .await?;

        match status {
            -1 => Ok(ScriptOutcome::Missing),
            0 => Ok(ScriptOutcome::Insufficient { remaining }),
            1 => Ok(ScriptOutcome::Consumed { remaining }),
            other => Err(CacheError::Command(format!(
                "consume script returned unexpected status {other}"
            ))),
        }
    }

    async fn read_entry(&self, date: NaiveDate) -> CacheResult<Option<LimitCacheEntry>> {
        let remaining_key = keys::remaining_key(&self.prefix, date);
        let meta_key = keys::meta_key(&self.prefix, date);
        let mut conn = self.conn.clone();

        // Two round-trips; a consume can land in between. The written-back
        // pair may then under-report one side for a tick, which the next
        // sync heals.
        let remaining: Option<String> = conn.get(&remaining_key).await?;
        let Some(remaining) = remaining else {
            return Ok(None);
        };
        let remaining: i64 = remaining.parse().map_err(|_| CacheError::Malformed {
            key: remaining_key,
            detail: format!("expected integer, got {remaining:?}"),
        })?;

        let meta: std::collections::HashMap<String, String> = conn.hgetall(&meta_key).await?;
        let field = |name: &str| -> i64 {
            meta.get(name).and_then(|v| v.parse().ok()).unwrap_or(0)
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
        let mut conn = self.conn.clone();
        let pattern = format!("{}:*", self.prefix);

        // SCAN, never KEYS: bounded per-iteration work on a live server.
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter: redis::AsyncIter<'_, String> = conn.scan_match(&pattern).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        if keys.is_empty() {
            return Ok(0);
        }

        let mut removed: u64 = 0;
        for chunk in keys.chunks(500) {
            let n: u64 = conn.del(chunk).await?;
            removed += n;
        }
        Ok(removed)
    }

    async fn server_info(&self) -> CacheResult<ServerInfo> {
        let mut conn = self.conn.clone();

        let entry_count: Option<u64> = redis::cmd("DBSIZE")
            .query_async::<i64>(&mut conn)
            .await
            .ok()
            .and_then(|n| u64::try_from(n).ok());

        let used_memory = redis::cmd("INFO")
            .arg("memory")
            .query_async::<String>(&mut conn)
            .await
            .ok()
            .and_then(|info| {
                info.lines()
                    .find_map(|line| line.strip_prefix("used_memory_human:"))
                    .map(|v| v.trim().to_string())
            });

        Ok(ServerInfo {
            backend: "redis",
            key_prefix: self.prefix.clone(),
            ttl: self.ttl,
            entry_count,
            used_memory,
        })
    }

    fn remaining_key(&self, date: NaiveDate) -> String {
        keys::remaining_key(&self.prefix, date)
    }
}
