//! Workflow controller: owns the registry of active runners.
//!
//! Lifecycle:
//! - `register` persists the workflow as pending, then starts its runner
//! - `init` resumes every pending workflow after a restart
//! - `cancel` stops one runner, waits for it to exit, then marks the workflow
//!   cancelled
//! - `shutdown` stops every runner but leaves workflows pending so the next
//!   `init` picks them up again
//!
//! `init`, `register` and `cancel` are serialized by one async lifecycle
//! lock. A register issued while a cancel is in flight waits for the
//! cancelled status to be written, so the stored row always matches the
//! runner that ends up registered.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use costsync_core::{CostSource, WorkflowPersistence};
//! use costsync_domain::Workflow;
//! use costsync_infra::observability::metrics::SyncMetrics;
//! use costsync_infra::scheduling::{RunnerConfig, WorkflowController};
//!
//! # async fn example(
//! #     store: Arc<dyn WorkflowPersistence>,
//! #     source: Arc<dyn CostSource>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let controller = WorkflowController::new(
//!     store,
//!     source,
//!     RunnerConfig::default(),
//!     Arc::new(SyncMetrics::new()),
//! );
//!
//! controller.init().await?;
//! controller.register(Workflow::new("acme")).await?;
//! // ... application runs ...
//! controller.cancel("acme").await?;
//! controller.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use costsync_core::{CostSource, WorkflowPersistence};
use costsync_domain::{Result, Workflow, WorkflowStatus};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};
use super::registry::{WorkflowDescriptor, WorkflowRegistry};
use super::runner::{ProgressReceiver, RunnerConfig, RunnerContext, WorkflowRunner};
use crate::observability::metrics::SyncMetrics;

/// Starts, tracks and stops one runner per workflow
pub struct WorkflowController {
    context: RunnerContext,
    registry: WorkflowRegistry,
    lifecycle: Mutex<()>,
}

impl WorkflowController {
    pub fn new(
        persistence: Arc<dyn WorkflowPersistence>,
        source: Arc<dyn CostSource>,
        config: RunnerConfig,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            context: RunnerContext { source, persistence, metrics, config },
            registry: WorkflowRegistry::new(),
            lifecycle: Mutex::new(()),
        }
    }

    /// Start a runner for every pending workflow that is not already running.
    ///
    /// Returns how many runners were started.
    ///
    /// # Errors
    /// Returns the persistence error if pending workflows cannot be listed.
    #[instrument(skip(self))]
    pub async fn init(&self) -> Result<usize> {
        let _lifecycle = self.lifecycle.lock().await;
        let pending = self.context.persistence.list_workflows(Some(WorkflowStatus::Pending)).await?;

        let mut started = 0;
        for workflow in pending {
            let id = workflow.workspace_id.clone();
            if self.start_runner(workflow) {
                started += 1;
            } else {
                info!(workspace = %id, "workflow already running, skipping");
            }
        }

        info!(started, "pending workflows resumed");
        Ok(started)
    }

    /// Persist `workflow` as pending and start its runner.
    ///
    /// Re-registering a stopped workflow keeps its stored checkpoint.
    ///
    /// # Errors
    /// - `AlreadyRunning` if a runner for this workspace is active
    /// - `RegistrationFailed` if the workflow could not be persisted; no
    ///   runner is started
    #[instrument(skip(self, workflow), fields(workspace = %workflow.workspace_id))]
    pub async fn register(&self, workflow: Workflow) -> SchedulerResult<()> {
        let workspace = workflow.workspace_id;
        let _lifecycle = self.lifecycle.lock().await;
        if self.registry.contains_live(&workspace) {
            return Err(SchedulerError::AlreadyRunning(workspace));
        }

        let stored = self
            .context
            .persistence
            .create_workflow(&workspace)
            .await
            .map_err(|source| SchedulerError::RegistrationFailed {
                workspace: workspace.clone(),
                source,
            })?;

        if !self.start_runner(stored) {
            return Err(SchedulerError::AlreadyRunning(workspace));
        }

        info!("workflow registered");
        Ok(())
    }

    /// Stop the runner for `workspace` and mark the workflow cancelled.
    ///
    /// Returns once the runner has exited and left the registry. The
    /// cancelled status is written before the registry entry is released;
    /// the write is best effort and only logged on failure.
    ///
    /// # Errors
    /// - `NotRunning` if no runner is registered for `workspace`
    /// - `TaskJoinFailed` if the runner task panicked
    #[instrument(skip(self))]
    pub async fn cancel(&self, workspace: &str) -> SchedulerResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let signals = self
            .registry
            .stop_signals(workspace)
            .ok_or_else(|| SchedulerError::NotRunning(workspace.to_string()))?;

        signals.cancel.cancel();
        signals.done.cancelled().await;

        if let Err(err) = self
            .context
            .persistence
            .update_workflow_status(workspace, WorkflowStatus::Cancelled, None)
            .await
        {
            warn!(error = %err, "failed to record cancelled status");
        }

        let Some(descriptor) = self.registry.remove(workspace, signals.generation) else {
            return Ok(());
        };

        let joined = join_runner(workspace, descriptor).await;
        info!("workflow cancelled");
        joined
    }

    /// Stop every runner and wait for all of them to exit.
    ///
    /// Persisted status is left untouched. Returns how many runners were
    /// stopped.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> usize {
        let descriptors = self.registry.drain();
        for (_, descriptor) in &descriptors {
            descriptor.cancel.cancel();
        }

        let stopped = descriptors.len();
        for (workspace, descriptor) in descriptors {
            descriptor.done.cancelled().await;
            // Already logged; shutdown keeps going for the remaining runners.
            let _ = join_runner(&workspace, descriptor).await;
        }

        info!(stopped, "all runners stopped");
        stopped
    }

    /// True while a runner for `workspace` is active.
    pub fn is_running(&self, workspace: &str) -> bool {
        self.registry.contains_live(workspace)
    }

    /// Workspaces with an active runner, sorted.
    pub fn active_workflows(&self) -> Vec<String> {
        self.registry.live_ids()
    }

    /// Progress stream of the runner for `workspace`, if one is registered.
    pub fn subscribe(&self, workspace: &str) -> Option<ProgressReceiver> {
        self.registry.progress(workspace)
    }

    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        &self.context.metrics
    }

    fn start_runner(&self, workflow: Workflow) -> bool {
        let workspace = workflow.workspace_id.clone();
        let context = self.context.clone();

        self.registry.insert_if_absent(&workspace, move || {
            let cancel = CancellationToken::new();
            let done = CancellationToken::new();
            let (handle, progress) = WorkflowRunner::spawn(
                workflow.clone(),
                context,
                cancel.clone(),
                done.clone(),
            );
            WorkflowDescriptor::new(workflow, cancel, done, progress, handle)
        })
    }
}

async fn join_runner(workspace: &str, descriptor: WorkflowDescriptor) -> SchedulerResult<()> {
    descriptor.handle.await.map_err(|err| {
        error!(workspace = %workspace, error = %err, "runner task ended abnormally");
        SchedulerError::TaskJoinFailed(format!("{workspace}: {err}"))
    })
}

/// Ensure runners are signalled when the controller is dropped
impl Drop for WorkflowController {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            warn!("WorkflowController dropped with active runners; cancelling");
            self.registry.cancel_all();
        }
    }
}
