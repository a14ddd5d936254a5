//! Read-through cache shared by the service decorators.
//!
//! The cache is an optimisation only. Every store failure or timeout is
//! logged, counted and then treated as a miss (reads) or ignored (writes and
//! deletions); the wrapped operation's own errors are returned and never
//! cached.

pub mod keys;
mod locks;
mod memory;
mod metrics;
mod redis_store;

pub use locks::{KeyLockGuard, KeyLocks};
pub use memory::MemoryCache;
pub use metrics::{CacheMetrics, CacheMetricsReport};
pub use redis_store::RedisCache;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::models::{DashboardStats, MatrixPage, TranslationPage};

/// Stored in place of an entry when the fetched value was empty.
pub const EMPTY_SENTINEL: &str = "empty";

/// Key/value store with per-key expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Delete every key starting with `prefix`; returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> anyhow::Result<u64>;
}

/// A value the cache can hold, with a notion of "carries nothing".
pub trait Cacheable: Serialize + DeserializeOwned + Send + Sync {
    fn is_empty_result(&self) -> bool;

    /// What a sentinel hit returns.
    fn empty_result() -> Self;
}

impl Cacheable for MatrixPage {
    fn is_empty_result(&self) -> bool {
        self.total == 0
    }

    fn empty_result() -> Self {
        MatrixPage::default()
    }
}

impl Cacheable for TranslationPage {
    fn is_empty_result(&self) -> bool {
        self.total == 0
    }

    fn empty_result() -> Self {
        TranslationPage::default()
    }
}

impl Cacheable for DashboardStats {
    fn is_empty_result(&self) -> bool {
        false
    }

    fn empty_result() -> Self {
        DashboardStats::default()
    }
}

impl<T: Serialize + DeserializeOwned + Send + Sync> Cacheable for Vec<T> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }

    fn empty_result() -> Self {
        Vec::new()
    }
}

impl<T: Serialize + DeserializeOwned + Send + Sync> Cacheable for Option<T> {
    fn is_empty_result(&self) -> bool {
        self.is_none()
    }

    fn empty_result() -> Self {
        None
    }
}

/// Wrapper around cached data with the time it was written.
#[derive(Debug, Serialize, Deserialize)]
struct CachedEntry<T> {
    data: T,
    cached_at: i64,
}

/// Base TTL plus 1-10 whole minutes of random jitter.
pub fn with_jitter(base: Duration) -> Duration {
    let minutes: u64 = rand::rng().random_range(1..=10);
    base + Duration::from_secs(minutes * 60)
}

pub struct CacheService {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
    locks: KeyLocks,
    metrics: CacheMetrics,
}

impl CacheService {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            locks: KeyLocks::new(),
            metrics: CacheMetrics::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> CacheMetricsReport {
        self.metrics.report()
    }

    /// Key as written to the store.
    pub fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    /// Serve `key` from the cache, or run `fetch` and cache its result.
    ///
    /// Concurrent reads of the same key in this process are serialised, so a
    /// burst of misses reaches the store once. Empty results are cached as the
    /// sentinel for the configured empty TTL; others for `base_ttl` plus jitter.
    pub async fn read_through<T, F, Fut>(&self, key: &str, base_ttl: Duration, fetch: F) -> Result<T>
    where
        T: Cacheable,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let key = self.namespaced(key);
        let _guard = self.locks.lock(&key).await;

        if let Some(raw) = self.store_get(&key).await {
            if raw == EMPTY_SENTINEL {
                self.metrics.record_empty_hit();
                debug!(key = %key, "Cache hit (empty)");
                return Ok(T::empty_result());
            }
            match serde_json::from_str::<CachedEntry<T>>(&raw) {
                Ok(entry) => {
                    self.metrics.record_hit();
                    debug!(key = %key, "Cache hit");
                    return Ok(entry.data);
                }
                Err(e) => {
                    self.metrics.record_error();
                    warn!("cache: failed to deserialize {}: {}", key, e);
                }
            }
        }

        self.metrics.record_miss();
        debug!(key = %key, "Cache miss");
        let value = fetch().await?;

        if value.is_empty_result() {
            self.store_set(&key, EMPTY_SENTINEL, self.config.empty_ttl)
                .await;
        } else {
            let entry = CachedEntry {
                data: &value,
                cached_at: Utc::now().timestamp_millis(),
            };
            match serde_json::to_string(&entry) {
                Ok(json) => self.store_set(&key, &json, with_jitter(base_ttl)).await,
                Err(e) => {
                    self.metrics.record_error();
                    warn!("cache: failed to serialize {}: {}", key, e);
                }
            }
        }

        Ok(value)
    }

    /// Delete one key (best effort).
    pub async fn invalidate(&self, key: &str) {
        let key = self.namespaced(key);
        self.metrics.record_invalidation();
        match tokio::time::timeout(self.config.op_timeout, self.store.delete(&key)).await {
            Ok(Ok(())) => debug!(key = %key, "Cache key invalidated"),
            Ok(Err(e)) => {
                self.metrics.record_error();
                warn!("cache: failed to delete {}: {}", key, e);
            }
            Err(_) => {
                self.metrics.record_error();
                warn!("cache: delete of {} timed out", key);
            }
        }
    }

    /// Delete every key under `prefix` (best effort).
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let prefix = self.namespaced(prefix);
        self.metrics.record_invalidation();
        match tokio::time::timeout(self.config.op_timeout, self.store.delete_prefix(&prefix)).await
        {
            Ok(Ok(removed)) => debug!(prefix = %prefix, removed, "Cache prefix invalidated"),
            Ok(Err(e)) => {
                self.metrics.record_error();
                warn!("cache: failed to delete prefix {}: {}", prefix, e);
            }
            Err(_) => {
                self.metrics.record_error();
                warn!("cache: delete of prefix {} timed out", prefix);
            }
        }
    }

    async fn store_get(&self, key: &str) -> Option<String> {
        match tokio::time::timeout(self.config.op_timeout, self.store.get(key)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                self.metrics.record_error();
                warn!("cache: get failed for {}: {}", key, e);
                None
            }
            Err(_) => {
                self.metrics.record_error();
                warn!("cache: get of {} timed out", key);
                None
            }
        }
    }

    async fn store_set(&self, key: &str, value: &str, ttl: Duration) {
        match tokio::time::timeout(self.config.op_timeout, self.store.set(key, value, ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.metrics.record_error();
                warn!("cache: failed to set {}: {}", key, e);
            }
            Err(_) => {
                self.metrics.record_error();
                warn!("cache: set of {} timed out", key);
            }
        }
    }
}
