//! Cache counters for one [`CacheService`](super::CacheService).

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Reads answered from a cached entry
    hits: AtomicUsize,

    /// Reads answered from the empty sentinel
    empty_hits: AtomicUsize,

    /// Reads that fell through to the store
    misses: AtomicUsize,

    /// Cache store failures and timeouts, all swallowed
    errors: AtomicUsize,

    /// Key and prefix deletions issued after writes
    invalidations: AtomicUsize,
}

impl CacheMetrics {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty_hit(&self) {
        self.empty_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Generate a metrics report.
    pub fn report(&self) -> CacheMetricsReport {
        let hits = self.hits.load(Ordering::Relaxed);
        let empty_hits = self.empty_hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let reads = hits + empty_hits + misses;
        let hit_rate = if reads > 0 {
            ((hits + empty_hits) as f64 / reads as f64) * 100.0
        } else {
            0.0
        };

        CacheMetricsReport {
            hits,
            empty_hits,
            misses,
            hit_rate,
            errors: self.errors.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of the cache counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheMetricsReport {
    pub hits: usize,
    pub empty_hits: usize,
    pub misses: usize,

    /// Share of reads served from the cache, as a percentage (0-100)
    pub hit_rate: f64,

    pub errors: usize,
    pub invalidations: usize,
}
