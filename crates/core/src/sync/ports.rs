//! Port interfaces for sync operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use costsync_domain::{Result, UsageRecord, UsageStats, Workflow, WorkflowStatus};

/// Remote source of already-shaped usage records
#[async_trait]
pub trait CostSource: Send + Sync {
    /// Aggregate record count and earliest record time, optionally limited to
    /// records at or after `since`
    async fn get_usage_stats(
        &self,
        workspace: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<UsageStats>;

    /// Usage records whose start time falls in `[start, end)`
    async fn get_usage(
        &self,
        workspace: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>>;
}

/// Durable store for workflows, their checkpoints and appended usage
#[async_trait]
pub trait WorkflowPersistence: Send + Sync {
    /// List workflows, optionally filtered by status
    async fn list_workflows(&self, status: Option<WorkflowStatus>) -> Result<Vec<Workflow>>;

    /// Fetch a single workflow by workspace id
    async fn get_workflow(&self, workspace: &str) -> Result<Option<Workflow>>;

    /// Create the workflow for `workspace` in `Pending` status.
    ///
    /// An existing row is moved back to `Pending` and keeps its creation
    /// time and checkpoint. Returns the stored workflow.
    async fn create_workflow(&self, workspace: &str) -> Result<Workflow>;

    /// Record a status transition and the last error (if any)
    async fn update_workflow_status(
        &self,
        workspace: &str,
        status: WorkflowStatus,
        last_error: Option<&str>,
    ) -> Result<()>;

    /// Append `records` and move the checkpoint to `checkpoint` atomically.
    ///
    /// Records already stored for the same `(workspace, id)` are skipped.
    /// The checkpoint never moves backwards. Returns the number of newly
    /// inserted records.
    async fn append_usage_and_advance_checkpoint(
        &self,
        workspace: &str,
        records: &[UsageRecord],
        checkpoint: DateTime<Utc>,
    ) -> Result<usize>;
}
