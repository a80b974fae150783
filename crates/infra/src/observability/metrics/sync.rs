//! Sync loop metrics
//!
//! Counters for committed and empty windows, persisted records and the two
//! transient failure kinds a runner retries (fetch and persist). Durations
//! are stored in microseconds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::observability::{MetricsError, MetricsResult};

/// Metrics shared by every runner of a controller
#[derive(Debug, Default)]
pub struct SyncMetrics {
    /// Windows persisted together with their checkpoint
    pub windows_committed: AtomicU64,
    /// Windows that returned no records and were skipped
    pub empty_windows: AtomicU64,
    /// Records newly inserted into the store
    pub records_persisted: AtomicU64,
    /// Failed cost source fetches
    pub fetch_errors: AtomicU64,
    /// Failed persistence commits
    pub persist_errors: AtomicU64,
    /// Duration of the last committed window (fetch + persist)
    pub last_sync_micros: AtomicU64,
}

/// Point-in-time copy of [`SyncMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncMetricsSnapshot {
    pub windows_committed: u64,
    pub empty_windows: u64,
    pub records_persisted: u64,
    pub fetch_errors: u64,
    pub persist_errors: u64,
    pub last_sync_duration: Duration,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed window and how many records it inserted.
    pub fn record_window_committed(&self, inserted: usize) -> MetricsResult<()> {
        let inserted = u64::try_from(inserted)
            .map_err(|_| MetricsError::Overflow { metric: "records_persisted" })?;
        self.windows_committed.fetch_add(1, Ordering::Relaxed);
        self.records_persisted.fetch_add(inserted, Ordering::Relaxed);
        Ok(())
    }

    pub fn record_empty_window(&self) -> MetricsResult<()> {
        self.empty_windows.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn record_fetch_error(&self) -> MetricsResult<()> {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn record_persist_error(&self) -> MetricsResult<()> {
        self.persist_errors.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn record_sync_duration(&self, duration: Duration) -> MetricsResult<()> {
        let micros = u64::try_from(duration.as_micros())
            .map_err(|_| MetricsError::Overflow { metric: "last_sync_duration" })?;
        self.last_sync_micros.store(micros, Ordering::Relaxed);
        Ok(())
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        SyncMetricsSnapshot {
            windows_committed: self.windows_committed.load(Ordering::Relaxed),
            empty_windows: self.empty_windows.load(Ordering::Relaxed),
            records_persisted: self.records_persisted.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            persist_errors: self.persist_errors.load(Ordering::Relaxed),
            last_sync_duration: Duration::from_micros(
                self.last_sync_micros.load(Ordering::Relaxed),
            ),
        }
    }
}
