//! Application constants
//!
//! Centralized location for the domain-level defaults used by the sync
//! engine and its configuration loader.

// Sync window defaults
pub const SECONDS_PER_DAY: u64 = 86_400;
pub const DEFAULT_BATCH_INTERVAL_SECS: u64 = 7 * SECONDS_PER_DAY;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

// Cost source stats cache
pub const DEFAULT_STATS_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_STATS_CACHE_CAPACITY: u64 = 1_000;

// Storage
pub const DEFAULT_DB_PATH: &str = "costsync.db";
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;
pub const DB_BUSY_TIMEOUT_MS: u64 = 5_000;

// Interval bounds accepted by the runner
pub const MAX_INTERVAL_SECS: u64 = 3_650 * SECONDS_PER_DAY;

// Stored timestamps keep microseconds
pub const STORED_SUBSEC_DIGITS: u16 = 6;
