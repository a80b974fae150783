//! Workflow model
//!
//! A workflow is the persisted identity of one workspace's sync process. The
//! workspace identifier doubles as the workflow id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Lifecycle status of a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Finished,
    Failed,
    Cancelled,
}

impl_domain_status_conversions!(WorkflowStatus {
    Pending => "pending",
    Finished => "finished",
    Failed => "failed",
    Cancelled => "cancelled",
});

/// Persisted identity and progress of one workspace's sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub workspace_id: String,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    /// Checkpoint; `None` means the workspace was never synced
    pub last_processed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Workflow {
    /// New pending workflow that has never been synced.
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            status: WorkflowStatus::Pending,
            created_at: Utc::now(),
            last_processed_at: None,
            last_error: None,
        }
    }

    /// Workflow id used as the registry key.
    pub fn id(&self) -> &str {
        &self.workspace_id
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self.status, WorkflowStatus::Pending)
    }

    /// Move the checkpoint forward.
    ///
    /// Returns `false` and leaves the workflow untouched when `checkpoint`
    /// would move the watermark backwards.
    pub fn advance_checkpoint(&mut self, checkpoint: DateTime<Utc>) -> bool {
        match self.last_processed_at {
            Some(current) if checkpoint < current => false,
            _ => {
                self.last_processed_at = Some(checkpoint);
                true
            }
        }
    }
}
