//! Per-workflow sync loop.
//!
//! A runner walks one workspace's usage forward in fixed-width windows:
//! sleep the poll interval, fetch `[start, start + batch_interval)`, dedup the
//! batch by record id, then append it and move the checkpoint in one
//! persistence call. Fetch and persist failures are logged and the same
//! window is retried on the next tick; the loop only ends on cancellation.
//! The first failure of a streak is written to the workflow's `last_error`
//! and the next commit clears it.
//!
//! Cancellation is observed while sleeping between iterations. A fetch or
//! commit already in flight runs to completion, so a cancelled runner still
//! commits the window it was working on and the store never sees half a
//! window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, SubsecRound, Utc};
use costsync_core::{dedup_by_id, resolve_start_time, CostSource, SyncWindow, WorkflowPersistence};
use costsync_domain::constants::{MAX_INTERVAL_SECS, STORED_SUBSEC_DIGITS};
use costsync_domain::{
    CostSyncError, Result, RunnerProgress, SyncConfig, UsageStats, Workflow, WorkflowStatus,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::observability::log_metric;
use crate::observability::metrics::SyncMetrics;

/// Latest progress published by a runner; `None` until the first commit.
pub type ProgressReceiver = watch::Receiver<Option<RunnerProgress>>;

/// Cadence of a runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Width of one fetch window
    pub batch_interval: chrono::Duration,
    /// Delay between loop iterations
    pub poll_interval: Duration,
    /// Wait instead of fetching a window that ends in the future
    pub defer_future_windows: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            batch_interval: chrono::Duration::days(7),
            poll_interval: Duration::from_secs(30),
            defer_future_windows: false,
        }
    }
}

impl RunnerConfig {
    /// Build a runner config from the `[sync]` configuration section.
    ///
    /// # Errors
    /// Returns `CostSyncError::Config` when either interval is zero or
    /// longer than `MAX_INTERVAL_SECS`.
    pub fn from_sync_config(config: &SyncConfig) -> Result<Self> {
        if config.batch_interval_seconds == 0 || config.poll_interval_seconds == 0 {
            return Err(CostSyncError::Config(
                "batch and poll intervals must be greater than zero".into(),
            ));
        }
        if config.batch_interval_seconds > MAX_INTERVAL_SECS
            || config.poll_interval_seconds > MAX_INTERVAL_SECS
        {
            return Err(CostSyncError::Config(format!(
                "batch and poll intervals must not exceed {MAX_INTERVAL_SECS} seconds"
            )));
        }

        let batch_interval = chrono::Duration::from_std(config.batch_interval())
            .map_err(|e| CostSyncError::Config(format!("Invalid batch interval: {e}")))?;

        Ok(Self {
            batch_interval,
            poll_interval: config.poll_interval(),
            defer_future_windows: config.defer_future_windows,
        })
    }
}

/// Collaborators shared by every runner of a controller
#[derive(Clone)]
pub struct RunnerContext {
    pub source: Arc<dyn CostSource>,
    pub persistence: Arc<dyn WorkflowPersistence>,
    pub metrics: Arc<SyncMetrics>,
    pub config: RunnerConfig,
}

/// Active sync loop for a single workflow
pub struct WorkflowRunner {
    workflow: Workflow,
    context: RunnerContext,
    cancel: CancellationToken,
    progress: watch::Sender<Option<RunnerProgress>>,
    processed: u64,
    total: u64,
    /// Error currently stored on the workflow row
    reported_error: Option<String>,
}

impl WorkflowRunner {
    /// Spawn the loop for `workflow` on the current tokio runtime.
    ///
    /// `cancel` stops the loop. `done` is cancelled exactly once when the
    /// task exits, including when it panics.
    pub fn spawn(
        workflow: Workflow,
        context: RunnerContext,
        cancel: CancellationToken,
        done: CancellationToken,
    ) -> (JoinHandle<()>, ProgressReceiver) {
        let (progress, receiver) = watch::channel(None);
        let reported_error = workflow.last_error.clone();
        let runner = Self {
            workflow,
            context,
            cancel,
            progress,
            processed: 0,
            total: 0,
            reported_error,
        };

        let handle = tokio::spawn(async move {
            let _done = done.drop_guard();
            runner.run().await;
        });

        (handle, receiver)
    }

    async fn run(mut self) {
        let Some(mut window_start) = self.resolve_start().await else {
            debug!(workspace = %self.workflow.id(), "runner cancelled before first window");
            return;
        };

        info!(
            workspace = %self.workflow.id(),
            window_start = %window_start,
            total = self.total,
            "runner started"
        );

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!(workspace = %self.workflow.id(), "runner cancelled");
                    break;
                }
                () = tokio::time::sleep(self.context.config.poll_interval) => {
                    window_start = self.sync_window(window_start).await;
                }
            }
        }

        info!(workspace = %self.workflow.id(), processed = self.processed, "runner stopped");
    }

    /// Resolve where the first window begins, retrying the stats call at the
    /// poll interval while there is no checkpoint to fall back on.
    ///
    /// Returns `None` once cancelled; a stats call in flight is awaited first.
    async fn resolve_start(&mut self) -> Option<DateTime<Utc>> {
        let batch_interval = self.context.config.batch_interval;

        loop {
            let stats = self
                .context
                .source
                .get_usage_stats(self.workflow.id(), self.workflow.last_processed_at)
                .await;
            if self.cancel.is_cancelled() {
                return None;
            }

            match stats {
                Ok(stats) => {
                    self.total = stats.record_count;
                    return Some(self.start_from(Some(&stats), batch_interval));
                }
                Err(err) if self.workflow.last_processed_at.is_some() => {
                    warn!(
                        workspace = %self.workflow.id(),
                        error = %err,
                        "usage stats unavailable, resuming from checkpoint"
                    );
                    return Some(self.start_from(None, batch_interval));
                }
                Err(err) => {
                    error!(
                        workspace = %self.workflow.id(),
                        error = %err,
                        "failed to fetch usage stats, retrying"
                    );
                    log_metric(self.context.metrics.record_fetch_error(), "sync.fetch_error");
                    self.report_error(&err).await;
                }
            }

            tokio::select! {
                () = self.cancel.cancelled() => return None,
                () = tokio::time::sleep(self.context.config.poll_interval) => {}
            }
        }
    }

    fn start_from(
        &self,
        stats: Option<&UsageStats>,
        batch_interval: chrono::Duration,
    ) -> DateTime<Utc> {
        resolve_start_time(&self.workflow, stats, Utc::now(), batch_interval)
            .trunc_subsecs(STORED_SUBSEC_DIGITS)
    }

    /// Run one iteration and return where the next window starts.
    async fn sync_window(&mut self, start: DateTime<Utc>) -> DateTime<Utc> {
        let window = SyncWindow::starting_at(start, self.context.config.batch_interval);
        let workspace = self.workflow.id().to_string();

        if self.context.config.defer_future_windows && window.ends_after(Utc::now()) {
            debug!(workspace = %workspace, window_end = %window.end, "window not yet elapsed");
            return start;
        }

        let started = Instant::now();
        let fetched = self.context.source.get_usage(&workspace, window.start, window.end).await;

        let records = match fetched {
            Ok(records) => records,
            Err(err) => {
                error!(
                    workspace = %workspace,
                    window_start = %window.start,
                    window_end = %window.end,
                    error = %err,
                    error_kind = err.label(),
                    "failed to fetch usage window"
                );
                log_metric(self.context.metrics.record_fetch_error(), "sync.fetch_error");
                self.report_error(&err).await;
                return start;
            }
        };

        if records.is_empty() {
            debug!(
                workspace = %workspace,
                window_start = %window.start,
                window_end = %window.end,
                "empty usage window"
            );
            log_metric(self.context.metrics.record_empty_window(), "sync.empty_window");
            self.clear_error().await;
            return window.end;
        }

        let outside = records.iter().filter(|record| !window.contains(record.start_time)).count();
        if outside > 0 {
            warn!(
                workspace = %workspace,
                window_start = %window.start,
                window_end = %window.end,
                outside,
                "cost source returned records starting outside the window"
            );
        }

        let records = dedup_by_id(records);
        let committed = self
            .context
            .persistence
            .append_usage_and_advance_checkpoint(&workspace, &records, window.end)
            .await;

        match committed {
            Ok(inserted) => {
                self.workflow.advance_checkpoint(window.end);
                self.processed =
                    self.processed.saturating_add(u64::try_from(inserted).unwrap_or(u64::MAX));
                self.publish_progress(window.end);

                log_metric(
                    self.context.metrics.record_window_committed(inserted),
                    "sync.window_committed",
                );
                log_metric(
                    self.context.metrics.record_sync_duration(started.elapsed()),
                    "sync.duration",
                );

                info!(
                    workspace = %workspace,
                    window_start = %window.start,
                    window_end = %window.end,
                    records = records.len(),
                    inserted,
                    "usage window committed"
                );
                self.clear_error().await;
                window.end
            }
            Err(err) => {
                error!(
                    workspace = %workspace,
                    window_start = %window.start,
                    window_end = %window.end,
                    records = records.len(),
                    error = %err,
                    error_kind = err.label(),
                    "failed to persist usage window"
                );
                log_metric(self.context.metrics.record_persist_error(), "sync.persist_error");
                self.report_error(&err).await;
                start
            }
        }
    }

    /// Store the first error of a failure streak on the workflow row.
    async fn report_error(&mut self, err: &CostSyncError) {
        if self.reported_error.is_some() {
            return;
        }
        let message = err.to_string();
        if self.write_last_error(Some(&message)).await {
            self.reported_error = Some(message);
        }
    }

    async fn clear_error(&mut self) {
        if self.reported_error.is_some() && self.write_last_error(None).await {
            self.reported_error = None;
        }
    }

    /// Best effort; a failed write is retried at the next state change.
    async fn write_last_error(&self, last_error: Option<&str>) -> bool {
        let written = self
            .context
            .persistence
            .update_workflow_status(self.workflow.id(), WorkflowStatus::Pending, last_error)
            .await;
        match written {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    workspace = %self.workflow.id(),
                    error = %err,
                    "failed to record last error on workflow"
                );
                false
            }
        }
    }

    fn publish_progress(&self, checkpoint: DateTime<Utc>) {
        self.progress.send_replace(Some(RunnerProgress {
            workspace_id: self.workflow.workspace_id.clone(),
            processed: self.processed,
            total: self.total,
            checkpoint,
        }));
    }
}
