//! Observability infrastructure for metrics and logging
//!
//! ## Design Principles
//!
//! 1. **Future-Proof Returns**: All record methods return `MetricsResult<()>`
//!    so limits or validation can be added without API breakage. They
//!    currently always succeed.
//!
//! 2. **Memory Ordering**: SeqCst for counters feeding derived metrics,
//!    Relaxed for independent counters.
//!
//! Callers treat a failed recording as a dropped metric:
//!
//! ```rust
//! use costsync_infra::observability::metrics::SyncMetrics;
//!
//! let metrics = SyncMetrics::new();
//! if let Err(e) = metrics.record_empty_window() {
//!     tracing::warn!("Failed to record metric: {}", e);
//! }
//! ```

pub mod logging;
pub mod metrics;

/// Metrics error type
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Counter would overflow its storage type
    #[error("Counter overflow for metric '{metric}'")]
    Overflow {
        /// Metric name
        metric: &'static str,
    },
}

/// Result type for metrics operations
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Log a failed metric recording and carry on.
pub(crate) fn log_metric(result: MetricsResult<()>, metric: &'static str) {
    if let Err(err) = result {
        tracing::warn!(metric = metric, error = ?err, "Failed to record sync metric");
    }
}
