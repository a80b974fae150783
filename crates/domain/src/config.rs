//! Configuration structures
//!
//! Plain serde models; loading (env, JSON, TOML) lives in
//! `costsync-infra::config`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BATCH_INTERVAL_SECS, DEFAULT_DB_PATH, DEFAULT_DB_POOL_SIZE,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_STATS_CACHE_TTL_SECS,
};

/// Root configuration for the sync engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Local store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: DEFAULT_DB_PATH.to_string(), pool_size: DEFAULT_DB_POOL_SIZE }
    }
}

/// Runner cadence and cost source caching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Width of one fetch window
    pub batch_interval_seconds: u64,
    /// Delay between loop iterations
    pub poll_interval_seconds: u64,
    /// TTL for cached usage stats (0 disables caching)
    pub stats_cache_ttl_seconds: u64,
    /// Skip windows that end in the future instead of fetching them
    pub defer_future_windows: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_interval_seconds: DEFAULT_BATCH_INTERVAL_SECS,
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECS,
            stats_cache_ttl_seconds: DEFAULT_STATS_CACHE_TTL_SECS,
            defer_future_windows: false,
        }
    }
}

impl SyncConfig {
    pub const fn batch_interval(&self) -> Duration {
        Duration::from_secs(self.batch_interval_seconds)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub const fn stats_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_cache_ttl_seconds)
    }
}

const fn default_pool_size() -> u32 {
    DEFAULT_DB_POOL_SIZE
}
