//! Usage record types
//!
//! Records arrive already shaped by the cost source; the engine only
//! deduplicates and appends them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One billed unit of consumption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Stable upstream identifier; `(workspace, id)` is the dedup key
    pub id: String,
    pub resource_type: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub quantity: f64,
    pub unit: String,
    pub price_rate: f64,
    pub currency: String,
    pub sku: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Aggregate snapshot used to pick an initial sync start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub record_count: u64,
    pub earliest_record_at: Option<DateTime<Utc>>,
}

/// Progress summary emitted after each committed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerProgress {
    pub workspace_id: String,
    /// Records committed by this runner so far
    pub processed: u64,
    /// Total records the cost source reported
    pub total: u64,
    /// Checkpoint reached by the last commit
    pub checkpoint: DateTime<Utc>,
}
