//! Hit/miss counters for the cached cost source
//!
//! SeqCst on both counters so a snapshot reads a consistent pair.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::observability::MetricsResult;

/// Metrics for tracking usage-stats cache performance
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Number of cache hits
    pub cache_hits: AtomicU64,
    /// Number of cache misses
    pub cache_misses: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit
    pub fn record_hit(&self) -> MetricsResult<()> {
        self.cache_hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Record a cache miss
    pub fn record_miss(&self) -> MetricsResult<()> {
        self.cache_misses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn get_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::SeqCst)
    }

    pub fn get_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::SeqCst)
    }
}
