//! Scheduler error types

use costsync_domain::CostSyncError;
use thiserror::Error;

use crate::errors::InfraError;

/// Errors surfaced by the workflow controller
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A runner for this workflow is already active
    #[error("Workflow {0} is already running")]
    AlreadyRunning(String),

    /// No runner is active for this workflow
    #[error("Workflow {0} is not running")]
    NotRunning(String),

    /// Persisting the workflow failed, so no runner was started
    #[error("Failed to register workflow {workspace}: {source}")]
    RegistrationFailed {
        workspace: String,
        #[source]
        source: CostSyncError,
    },

    /// Runner task ended abnormally
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let costsync_err = match err {
            SchedulerError::AlreadyRunning(_) | SchedulerError::NotRunning(_) => {
                CostSyncError::InvalidInput(err.to_string())
            }
            SchedulerError::RegistrationFailed { source, .. } => source,
            SchedulerError::TaskJoinFailed(_) => CostSyncError::Internal(err.to_string()),
        };
        Self(costsync_err)
    }
}

impl From<SchedulerError> for CostSyncError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
