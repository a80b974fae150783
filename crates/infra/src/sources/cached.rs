//! Usage stats caching with moka
//!
//! Wraps any [`CostSource`] and caches `get_usage_stats` answers per
//! `(workspace, since)` for a short TTL. Runners ask for stats once at
//! startup, so a controller resuming many workflows, or a workflow that is
//! re-registered right after a cancel, does not hit the remote source again.
//!
//! - `get_usage` is always forwarded; windows are fetched once per commit
//! - Only `Ok` results are cached, never transient errors

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use costsync_core::CostSource;
use costsync_domain::constants::{DEFAULT_STATS_CACHE_CAPACITY, DEFAULT_STATS_CACHE_TTL_SECS};
use costsync_domain::{Result, SyncConfig, UsageRecord, UsageStats};
use moka::future::Cache;

use crate::observability::log_metric;
use crate::observability::metrics::CacheMetrics;

type StatsKey = (String, Option<DateTime<Utc>>);

/// Stats cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsCacheConfig {
    /// Time-to-live for cache entries
    pub ttl: Duration,

    /// Maximum number of cached entries
    pub max_capacity: u64,
}

impl Default for StatsCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_STATS_CACHE_TTL_SECS),
            max_capacity: DEFAULT_STATS_CACHE_CAPACITY,
        }
    }
}

impl StatsCacheConfig {
    /// Config with the TTL from the `[sync]` section, or `None` when caching
    /// is disabled (TTL of zero).
    pub fn from_sync_config(config: &SyncConfig) -> Option<Self> {
        (config.stats_cache_ttl_seconds > 0)
            .then(|| Self { ttl: config.stats_cache_ttl(), ..Self::default() })
    }

    /// Log configuration at startup
    pub fn log_config(&self) {
        tracing::info!(
            ttl_seconds = self.ttl.as_secs(),
            max_capacity = self.max_capacity,
            "usage stats cache configuration loaded"
        );
    }
}

/// [`CostSource`] decorator caching usage stats
pub struct CachedCostSource {
    inner: Arc<dyn CostSource>,
    stats: Cache<StatsKey, UsageStats>,
    metrics: Arc<CacheMetrics>,
}

impl CachedCostSource {
    pub fn new(inner: Arc<dyn CostSource>, config: StatsCacheConfig) -> Self {
        config.log_config();
        let stats = Cache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self { inner, stats, metrics: Arc::new(CacheMetrics::new()) }
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// Drop every cached answer for `workspace`.
    pub async fn invalidate_workspace(&self, workspace: &str) {
        let keys: Vec<StatsKey> = self
            .stats
            .iter()
            .filter(|(key, _)| key.0 == workspace)
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in keys {
            self.stats.invalidate(&key).await;
        }
    }
}

#[async_trait]
impl CostSource for CachedCostSource {
    async fn get_usage_stats(
        &self,
        workspace: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<UsageStats> {
        let key = (workspace.to_string(), since);

        if let Some(stats) = self.stats.get(&key).await {
            log_metric(self.metrics.record_hit(), "stats_cache.hit");
            return Ok(stats);
        }

        log_metric(self.metrics.record_miss(), "stats_cache.miss");
        let stats = self.inner.get_usage_stats(workspace, since).await?;
        self.stats.insert(key, stats).await;
        Ok(stats)
    }

    async fn get_usage(
        &self,
        workspace: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>> {
        self.inner.get_usage(workspace, start, end).await
    }
}
