//! Redis-backed cache store.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::fmt;
use std::time::Duration;

use super::CacheStore;

/// Keys fetched per SCAN round trip.
const SCAN_COUNT: usize = 100;

#[derive(Clone)]
pub struct RedisCache {
    redis: ConnectionManager,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("redis", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self { redis })
    }
}

/// Escape glob metacharacters so a prefix matches literally in `SCAN MATCH`.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self
            .redis
            .clone()
            .get(key)
            .await
            .map_err(|e| anyhow!("redis get failed: {}", e))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let _: () = self
            .redis
            .clone()
            .set_ex(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| anyhow!("redis set failed: {}", e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _: () = self
            .redis
            .clone()
            .del(key)
            .await
            .map_err(|e| anyhow!("redis del failed: {}", e))?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let pattern = format!("{}*", escape_glob(prefix));
        let mut redis = self.redis.clone();
        let mut cursor = 0u64;
        let mut deleted = 0u64;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut redis)
                .await
                .map_err(|e| anyhow!("redis SCAN failed for {}: {}", pattern, e))?;

            if !keys.is_empty() {
                let removed: u64 = redis
                    .del(&keys)
                    .await
                    .map_err(|e| anyhow!("redis del failed: {}", e))?;
                deleted += removed;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        Ok(deleted)
    }
}
