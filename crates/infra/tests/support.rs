//! Shared fakes and helpers for costsync-infra integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use costsync_core::{CostSource, WorkflowPersistence};
use costsync_domain::{CostSyncError, Result, UsageRecord, UsageStats, Workflow, WorkflowStatus};
use costsync_infra::database::DbManager;
use costsync_infra::observability::logging::{self, LogFormat};
use costsync_infra::RunnerConfig;
use parking_lot::Mutex;
use tempfile::TempDir;

/// Midnight UTC on the given day of January 2024.
pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
}

/// Usage record starting at midnight of `day` (January 2024).
pub fn usage(id: &str, quantity: f64, day: u32) -> UsageRecord {
    UsageRecord {
        id: id.to_string(),
        resource_type: "compute".into(),
        metadata: BTreeMap::from([("project".to_string(), "billing".to_string())]),
        quantity,
        unit: "hour".into(),
        price_rate: 0.5,
        currency: "USD".into(),
        sku: "vm-standard".into(),
        start_time: at(day),
        end_time: at(day) + chrono::Duration::hours(1),
    }
}

/// Route runner logs to the test output; `RUST_LOG` selects levels.
pub fn init_logging() {
    let _ = logging::init(LogFormat::Plain);
}

/// Weekly windows polled every few milliseconds.
pub fn fast_config() -> RunnerConfig {
    RunnerConfig {
        batch_interval: chrono::Duration::days(7),
        poll_interval: Duration::from_millis(5),
        defer_future_windows: false,
    }
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn wait_until<F: FnMut() -> bool>(mut condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Temporary SQLite database with the full schema applied.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let manager =
            DbManager::new(temp_dir.path().join("test.db"), 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should run");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    pub fn path(&self) -> std::path::PathBuf {
        self.manager.path().to_path_buf()
    }

    pub fn execute_batch(&self, sql: &str) {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/* -------------------------------------------------------------------------- */
/* FakeCostSource */
/* -------------------------------------------------------------------------- */

#[derive(Default)]
struct SourceState {
    records: Vec<UsageRecord>,
    earliest_override: Option<DateTime<Utc>>,
    hide_earliest: bool,
    requested_windows: Vec<(DateTime<Utc>, DateTime<Utc>)>,
    stats_requests: Vec<Option<DateTime<Utc>>>,
    usage_failures: usize,
    stats_failures: usize,
    usage_delay: Option<Duration>,
    completed_fetches: usize,
}

/// Cost source serving a fixed record list, filtered per window by start
/// time. Every requested window is recorded; failures can be scripted.
#[derive(Default)]
pub struct FakeCostSource {
    state: Mutex<SourceState>,
}

impl FakeCostSource {
    pub fn new(records: Vec<UsageRecord>) -> Self {
        Self { state: Mutex::new(SourceState { records, ..SourceState::default() }) }
    }

    /// Report `earliest` from `get_usage_stats` regardless of the records.
    pub fn with_earliest(self, earliest: DateTime<Utc>) -> Self {
        self.state.lock().earliest_override = Some(earliest);
        self
    }

    /// Report no earliest record from `get_usage_stats`, as a source without
    /// history does.
    pub fn without_earliest(self) -> Self {
        self.state.lock().hide_earliest = true;
        self
    }

    /// Fail the next `count` `get_usage` calls.
    pub fn fail_usage(&self, count: usize) {
        self.state.lock().usage_failures = count;
    }

    /// Make every `get_usage` call take `delay` before answering.
    pub fn delay_usage(&self, delay: Duration) {
        self.state.lock().usage_delay = Some(delay);
    }

    /// `get_usage` calls that ran to completion.
    pub fn completed_fetches(&self) -> usize {
        self.state.lock().completed_fetches
    }

    /// Fail the next `count` `get_usage_stats` calls.
    pub fn fail_stats(&self, count: usize) {
        self.state.lock().stats_failures = count;
    }

    pub fn requested_windows(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.state.lock().requested_windows.clone()
    }

    pub fn stats_requests(&self) -> Vec<Option<DateTime<Utc>>> {
        self.state.lock().stats_requests.clone()
    }
}

#[async_trait]
impl CostSource for FakeCostSource {
    async fn get_usage_stats(
        &self,
        _workspace: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<UsageStats> {
        let mut state = self.state.lock();
        state.stats_requests.push(since);
        if state.stats_failures > 0 {
            state.stats_failures -= 1;
            return Err(CostSyncError::Source("stats endpoint unavailable".into()));
        }

        let matching: Vec<&UsageRecord> = state
            .records
            .iter()
            .filter(|record| since.map_or(true, |since| record.start_time >= since))
            .collect();
        let earliest = state
            .earliest_override
            .or_else(|| matching.iter().map(|record| record.start_time).min())
            .filter(|_| !state.hide_earliest);

        Ok(UsageStats {
            record_count: matching.len() as u64,
            earliest_record_at: earliest,
        })
    }

    async fn get_usage(
        &self,
        _workspace: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>> {
        let delay = {
            let mut state = self.state.lock();
            state.requested_windows.push((start, end));
            state.usage_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.completed_fetches += 1;
        if state.usage_failures > 0 {
            state.usage_failures -= 1;
            return Err(CostSyncError::Source("usage endpoint timed out".into()));
        }

        Ok(state
            .records
            .iter()
            .filter(|record| record.start_time >= start && record.start_time < end)
            .cloned()
            .collect())
    }
}

/* -------------------------------------------------------------------------- */
/* InMemoryPersistence */
/* -------------------------------------------------------------------------- */

#[derive(Default)]
struct StoreState {
    workflows: HashMap<String, Workflow>,
    usage: HashMap<String, BTreeMap<String, UsageRecord>>,
    append_checkpoints: Vec<DateTime<Utc>>,
    append_failures: usize,
    fail_create: bool,
    fail_status_updates: bool,
    status_update_delay: Option<Duration>,
}

/// In-memory `WorkflowPersistence` with the same semantics as the SQLite
/// store, plus failure injection.
#[derive(Default)]
pub struct InMemoryPersistence {
    state: Mutex<StoreState>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a workflow as if it had been stored by an earlier process.
    pub fn seed(&self, workflow: Workflow) {
        self.state.lock().workflows.insert(workflow.workspace_id.clone(), workflow);
    }

    /// Fail the next `count` appends.
    pub fn fail_appends(&self, count: usize) {
        self.state.lock().append_failures = count;
    }

    pub fn fail_create(&self, fail: bool) {
        self.state.lock().fail_create = fail;
    }

    pub fn fail_status_updates(&self, fail: bool) {
        self.state.lock().fail_status_updates = fail;
    }

    /// Make every status update take `delay` before it is applied.
    pub fn delay_status_updates(&self, delay: Duration) {
        self.state.lock().status_update_delay = Some(delay);
    }

    pub fn workflow(&self, workspace: &str) -> Option<Workflow> {
        self.state.lock().workflows.get(workspace).cloned()
    }

    pub fn checkpoint(&self, workspace: &str) -> Option<DateTime<Utc>> {
        self.workflow(workspace).and_then(|workflow| workflow.last_processed_at)
    }

    pub fn stored_usage(&self, workspace: &str) -> Vec<UsageRecord> {
        self.state
            .lock()
            .usage
            .get(workspace)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Checkpoints passed to successful appends, in order.
    pub fn append_checkpoints(&self) -> Vec<DateTime<Utc>> {
        self.state.lock().append_checkpoints.clone()
    }
}

#[async_trait]
impl WorkflowPersistence for InMemoryPersistence {
    async fn list_workflows(&self, status: Option<WorkflowStatus>) -> Result<Vec<Workflow>> {
        let mut workflows: Vec<Workflow> = self
            .state
            .lock()
            .workflows
            .values()
            .filter(|workflow| status.map_or(true, |status| workflow.status == status))
            .cloned()
            .collect();
        workflows.sort_by(|a, b| a.workspace_id.cmp(&b.workspace_id));
        Ok(workflows)
    }

    async fn get_workflow(&self, workspace: &str) -> Result<Option<Workflow>> {
        Ok(self.workflow(workspace))
    }

    async fn create_workflow(&self, workspace: &str) -> Result<Workflow> {
        let mut state = self.state.lock();
        if state.fail_create {
            return Err(CostSyncError::Database("database is locked".into()));
        }

        let workflow = state
            .workflows
            .entry(workspace.to_string())
            .or_insert_with(|| Workflow::new(workspace));
        workflow.status = WorkflowStatus::Pending;
        workflow.last_error = None;
        Ok(workflow.clone())
    }

    async fn update_workflow_status(
        &self,
        workspace: &str,
        status: WorkflowStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        let delay = self.state.lock().status_update_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if state.fail_status_updates {
            return Err(CostSyncError::Database("database is read-only".into()));
        }

        let workflow = state
            .workflows
            .get_mut(workspace)
            .ok_or_else(|| CostSyncError::NotFound(format!("workflow {workspace}")))?;
        workflow.status = status;
        workflow.last_error = last_error.map(str::to_string);
        Ok(())
    }

    async fn append_usage_and_advance_checkpoint(
        &self,
        workspace: &str,
        records: &[UsageRecord],
        checkpoint: DateTime<Utc>,
    ) -> Result<usize> {
        let mut state = self.state.lock();
        if state.append_failures > 0 {
            state.append_failures -= 1;
            return Err(CostSyncError::Database("disk I/O error".into()));
        }
        if !state.workflows.contains_key(workspace) {
            return Err(CostSyncError::NotFound(format!("workflow {workspace}")));
        }

        let stored = state.usage.entry(workspace.to_string()).or_default();
        let mut inserted = 0;
        for record in records {
            if !stored.contains_key(&record.id) {
                stored.insert(record.id.clone(), record.clone());
                inserted += 1;
            }
        }

        if let Some(workflow) = state.workflows.get_mut(workspace) {
            workflow.advance_checkpoint(checkpoint);
        }
        state.append_checkpoints.push(checkpoint);
        Ok(inserted)
    }
}
