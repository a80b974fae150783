//! Metrics collection modules
//!
//! Thread-safe metrics shared by the runners of one controller.

pub mod cache;
pub mod sync;

// Re-export metric types for convenience
pub use cache::CacheMetrics;
pub use sync::{SyncMetrics, SyncMetricsSnapshot};
