//! Window arithmetic for incremental sync
//!
//! Windows are fixed-width and half-open (`[start, end)`). They slide from
//! the checkpoint and are never aligned to calendar boundaries.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use costsync_domain::{UsageRecord, UsageStats, Workflow};
use tracing::debug;

/// Half-open time range fetched in one runner iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    /// Window of `width` beginning at `start`.
    ///
    /// The end saturates at the latest representable instant.
    pub fn starting_at(start: DateTime<Utc>, width: Duration) -> Self {
        Self { start, end: start.checked_add_signed(width).unwrap_or(DateTime::<Utc>::MAX_UTC) }
    }

    /// The adjacent window that begins where this one ends.
    pub fn next(&self) -> Self {
        Self::starting_at(self.end, self.width())
    }

    pub fn width(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// True when the window has not fully elapsed at `now`.
    pub fn ends_after(&self, now: DateTime<Utc>) -> bool {
        self.end > now
    }
}

/// Pick where a runner's first window begins.
///
/// Priority: the workflow's checkpoint, then the earliest record reported by
/// the cost source, then one batch interval before `now`.
pub fn resolve_start_time(
    workflow: &Workflow,
    stats: Option<&UsageStats>,
    now: DateTime<Utc>,
    batch_interval: Duration,
) -> DateTime<Utc> {
    if let Some(checkpoint) = workflow.last_processed_at {
        return checkpoint;
    }

    stats.and_then(|stats| stats.earliest_record_at).unwrap_or_else(|| {
        now.checked_sub_signed(batch_interval).unwrap_or(DateTime::<Utc>::MIN_UTC)
    })
}

/// Collapse records sharing an id, keeping the last occurrence.
///
/// The surviving record takes the position of the id's first occurrence so
/// batch order stays stable.
pub fn dedup_by_id(records: Vec<UsageRecord>) -> Vec<UsageRecord> {
    let incoming = records.len();
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(incoming);
    let mut unique: Vec<UsageRecord> = Vec::with_capacity(incoming);

    for record in records {
        if let Some(&position) = positions.get(&record.id) {
            unique[position] = record;
        } else {
            positions.insert(record.id.clone(), unique.len());
            unique.push(record);
        }
    }

    if unique.len() < incoming {
        debug!(incoming, unique = unique.len(), "dropped duplicate usage records from batch");
    }

    unique
}
