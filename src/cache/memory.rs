//! In-process cache store, used when no Redis URL is configured and in tests.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::CacheStore;

/// Writes between two sweeps of expired entries.
const SWEEP_EVERY: usize = 256;

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    sets_since_sweep: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, (String, Instant)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries()
            .iter()
            .filter(|(_, (_, expires_at))| *expires_at > now)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Raw stored value of a live key.
    pub fn raw(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries()
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone())
    }

    /// Entries held in memory, expired ones not yet swept included.
    pub fn held_len(&self) -> usize {
        self.entries().len()
    }

    /// Remaining lifetime of a live key.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries()
            .get(key)
            .and_then(|(_, expires_at)| expires_at.checked_duration_since(now))
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries();
        let expired = match entries.get(key) {
            Some((value, expires_at)) if *expires_at > now => return Ok(Some(value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries();
        if self.sets_since_sweep.fetch_add(1, Ordering::Relaxed) + 1 >= SWEEP_EVERY {
            self.sets_since_sweep.store(0, Ordering::Relaxed);
            entries.retain(|_, (_, expires_at)| *expires_at > now);
        }
        entries.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        cache.set("a", "1", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap().as_deref(), Some("1"));

        cache.delete("a").await.unwrap();
        assert!(cache.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_are_misses() {
        let cache = MemoryCache::new();
        cache.set("a", "1", Duration::ZERO).await.unwrap();
        assert!(cache.get("a").await.unwrap().is_none());
        assert!(cache.keys().is_empty());
    }

    #[tokio::test]
    async fn test_expired_entries_are_swept_on_write() {
        let cache = MemoryCache::new();
        for i in 0..1000 {
            let key = format!("translation_matrix:1:search:{:016x}:20:0", i);
            cache.set(&key, "empty", Duration::ZERO).await.unwrap();
        }
        cache.set("languages:all", "[]", Duration::from_secs(60)).await.unwrap();

        assert!(cache.held_len() < SWEEP_EVERY);
        assert_eq!(cache.keys(), vec!["languages:all".to_string()]);
    }

    #[tokio::test]
    async fn test_live_entries_survive_sweep() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        for i in 0..SWEEP_EVERY * 2 {
            cache.set(&format!("k{}", i), "v", ttl).await.unwrap();
        }
        assert_eq!(cache.held_len(), SWEEP_EVERY * 2);
        assert_eq!(cache.get("k0").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("m:1:a", "x", ttl).await.unwrap();
        cache.set("m:1:b", "x", ttl).await.unwrap();
        cache.set("m:10:a", "x", ttl).await.unwrap();

        assert_eq!(cache.delete_prefix("m:1:").await.unwrap(), 2);
        assert_eq!(cache.keys(), vec!["m:10:a".to_string()]);
    }

    #[tokio::test]
    async fn test_ttl_reports_remaining_lifetime() {
        let cache = MemoryCache::new();
        cache.set("a", "1", Duration::from_secs(120)).await.unwrap();
        let ttl = cache.ttl("a").unwrap();
        assert!(ttl <= Duration::from_secs(120));
        assert!(ttl > Duration::from_secs(110));
        assert!(cache.ttl("missing").is_none());
    }
}
