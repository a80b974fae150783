//! SQLite-backed implementation of the `WorkflowPersistence` port.
//!
//! Usage appends and checkpoint moves share one transaction per window, so a
//! failed commit leaves both at their last committed state. Records are keyed
//! by `(workspace_id, record_id)` and inserted with `ON CONFLICT DO NOTHING`,
//! which makes re-delivered windows idempotent. Time columns hold unix
//! microseconds, so a checkpoint read back equals the one committed.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use costsync_core::WorkflowPersistence;
use costsync_domain::{CostSyncError, Result, UsageRecord, Workflow, WorkflowStatus};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use tokio::task;
use tracing::{debug, instrument, warn};

use super::manager::{map_sql_error, DbManager};
use crate::errors::InfraError;

/// Workflow and usage store on the shared SQLite pool.
pub struct SqliteWorkflowStore {
    db: Arc<DbManager>,
}

impl SqliteWorkflowStore {
    /// Construct a store backed by the shared pool.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Stored usage for `workspace` whose start time falls in `[start, end)`,
    /// ordered by start time.
    pub async fn list_usage(
        &self,
        workspace: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>> {
        let db = Arc::clone(&self.db);
        let workspace = workspace.to_string();

        task::spawn_blocking(move || -> Result<Vec<UsageRecord>> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 3] =
                [&workspace, &start.timestamp_micros(), &end.timestamp_micros()];
            let mut stmt = conn.prepare(USAGE_BY_RANGE_QUERY).map_err(map_sql_error)?;
            let rows = stmt.query_map(params.as_slice(), map_usage_row).map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Number of usage records stored for `workspace`.
    pub async fn count_usage(&self, workspace: &str) -> Result<u64> {
        let db = Arc::clone(&self.db);
        let workspace = workspace.to_string();

        task::spawn_blocking(move || -> Result<u64> {
            let conn = db.get_connection()?;
            let count: i64 = conn
                .query_row(USAGE_COUNT_QUERY, params![workspace], |row| row.get(0))
                .map_err(map_sql_error)?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
        .map_err(map_join_error)?
    }

    fn fetch_workflow(conn: &Connection, workspace: &str) -> Result<Option<Workflow>> {
        conn.query_row(WORKFLOW_BY_ID_QUERY, params![workspace], map_workflow_row)
            .optional()
            .map_err(map_sql_error)
    }

    fn upsert_pending(conn: &Connection, workspace: &str) -> Result<Workflow> {
        let now = Utc::now().timestamp_micros();
        let status = WorkflowStatus::Pending.as_str();
        conn.execute(WORKFLOW_UPSERT_SQL, params![workspace, status, now])
            .map_err(map_sql_error)?;

        Self::fetch_workflow(conn, workspace)?.ok_or_else(|| {
            CostSyncError::Internal(format!("workflow {workspace} missing after upsert"))
        })
    }

    /// Append `records` and move the checkpoint inside one transaction.
    ///
    /// The transaction rolls back on drop if any step fails.
    fn append_in_transaction(
        conn: &mut Connection,
        workspace: &str,
        records: &[UsageRecord],
        checkpoint: DateTime<Utc>,
    ) -> Result<usize> {
        let tx = conn.transaction().map_err(map_sql_error)?;
        let inserted_at = Utc::now().timestamp_micros();

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(USAGE_INSERT_SQL).map_err(map_sql_error)?;
            for record in records {
                let metadata = encode_metadata(&record.metadata)?;
                let params: [&dyn ToSql; 12] = [
                    &workspace,
                    &record.id,
                    &record.resource_type,
                    &metadata,
                    &record.quantity,
                    &record.unit,
                    &record.price_rate,
                    &record.currency,
                    &record.sku,
                    &record.start_time.timestamp_micros(),
                    &record.end_time.timestamp_micros(),
                    &inserted_at,
                ];
                inserted += stmt.execute(params.as_slice()).map_err(map_sql_error)?;
            }
        }

        let updated = tx
            .execute(
                WORKFLOW_ADVANCE_CHECKPOINT_SQL,
                params![workspace, checkpoint.timestamp_micros(), inserted_at],
            )
            .map_err(map_sql_error)?;
        if updated == 0 {
            return Err(CostSyncError::NotFound(format!("workflow {workspace}")));
        }

        tx.commit().map_err(map_sql_error)?;

        let skipped = records.len() - inserted;
        if skipped > 0 {
            debug!(workspace, skipped, "usage records already stored");
        }

        Ok(inserted)
    }
}

#[async_trait]
impl WorkflowPersistence for SqliteWorkflowStore {
    async fn list_workflows(&self, status: Option<WorkflowStatus>) -> Result<Vec<Workflow>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<Workflow>> {
            let conn = db.get_connection()?;
            let workflows = match status {
                Some(status) => {
                    let mut stmt =
                        conn.prepare(WORKFLOWS_BY_STATUS_QUERY).map_err(map_sql_error)?;
                    let rows = stmt
                        .query_map(params![status.as_str()], map_workflow_row)
                        .map_err(map_sql_error)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()
                }
                None => {
                    let mut stmt = conn.prepare(WORKFLOWS_ALL_QUERY).map_err(map_sql_error)?;
                    let rows = stmt.query_map([], map_workflow_row).map_err(map_sql_error)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()
                }
            };
            workflows.map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_workflow(&self, workspace: &str) -> Result<Option<Workflow>> {
        let db = Arc::clone(&self.db);
        let workspace = workspace.to_string();

        task::spawn_blocking(move || -> Result<Option<Workflow>> {
            let conn = db.get_connection()?;
            Self::fetch_workflow(&conn, &workspace)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn create_workflow(&self, workspace: &str) -> Result<Workflow> {
        let db = Arc::clone(&self.db);
        let workspace = workspace.to_string();

        task::spawn_blocking(move || -> Result<Workflow> {
            let conn = db.get_connection()?;
            Self::upsert_pending(&conn, &workspace)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_workflow_status(
        &self,
        workspace: &str,
        status: WorkflowStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        let db = Arc::clone(&self.db);
        let workspace = workspace.to_string();
        let last_error = last_error.map(str::to_string);

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let updated = conn
                .execute(
                    WORKFLOW_UPDATE_STATUS_SQL,
                    params![workspace, status.as_str(), last_error, Utc::now().timestamp_micros()],
                )
                .map_err(map_sql_error)?;
            if updated == 0 {
                return Err(CostSyncError::NotFound(format!("workflow {workspace}")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn append_usage_and_advance_checkpoint(
        &self,
        workspace: &str,
        records: &[UsageRecord],
        checkpoint: DateTime<Utc>,
    ) -> Result<usize> {
        let db = Arc::clone(&self.db);
        let workspace = workspace.to_string();
        let records = records.to_vec();

        task::spawn_blocking(move || -> Result<usize> {
            let mut conn = db.get_connection()?;
            Self::append_in_transaction(&mut conn, &workspace, &records, checkpoint)
        })
        .await
        .map_err(map_join_error)?
    }
}

const WORKFLOW_BY_ID_QUERY: &str = "SELECT workspace_id, status, created_at, last_processed_at,
        last_error
    FROM sync_workflows
    WHERE workspace_id = ?1";

const WORKFLOWS_BY_STATUS_QUERY: &str = "SELECT workspace_id, status, created_at,
        last_processed_at, last_error
    FROM sync_workflows
    WHERE status = ?1
    ORDER BY created_at, workspace_id";

const WORKFLOWS_ALL_QUERY: &str = "SELECT workspace_id, status, created_at, last_processed_at,
        last_error
    FROM sync_workflows
    ORDER BY created_at, workspace_id";

// Re-registration resets status only; created_at and the checkpoint survive.
const WORKFLOW_UPSERT_SQL: &str = "INSERT INTO sync_workflows (
        workspace_id, status, created_at, last_processed_at, last_error, updated_at
    ) VALUES (?1, ?2, ?3, NULL, NULL, ?3)
    ON CONFLICT(workspace_id) DO UPDATE SET
        status = excluded.status,
        last_error = NULL,
        updated_at = excluded.updated_at";

const WORKFLOW_UPDATE_STATUS_SQL: &str = "UPDATE sync_workflows
    SET status = ?2, last_error = ?3, updated_at = ?4
    WHERE workspace_id = ?1";

const WORKFLOW_ADVANCE_CHECKPOINT_SQL: &str = "UPDATE sync_workflows
    SET last_processed_at = CASE
            WHEN last_processed_at IS NULL OR last_processed_at < ?2 THEN ?2
            ELSE last_processed_at
        END,
        updated_at = ?3
    WHERE workspace_id = ?1";

const USAGE_INSERT_SQL: &str = "INSERT INTO usage_records (
        workspace_id, record_id, resource_type, metadata_json, quantity, unit, price_rate,
        currency, sku, start_time, end_time, inserted_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
    ON CONFLICT(workspace_id, record_id) DO NOTHING";

const USAGE_BY_RANGE_QUERY: &str = "SELECT record_id, resource_type, metadata_json, quantity,
        unit, price_rate, currency, sku, start_time, end_time
    FROM usage_records
    WHERE workspace_id = ?1 AND start_time >= ?2 AND start_time < ?3
    ORDER BY start_time, record_id";

const USAGE_COUNT_QUERY: &str = "SELECT COUNT(*) FROM usage_records WHERE workspace_id = ?1";

fn map_workflow_row(row: &Row<'_>) -> rusqlite::Result<Workflow> {
    let status_raw: String = row.get(1)?;
    let status = status_raw.parse::<WorkflowStatus>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            Box::new(CostSyncError::Database(err)),
        )
    })?;

    Ok(Workflow {
        workspace_id: row.get(0)?,
        status,
        created_at: time_column(row, 2)?,
        last_processed_at: optional_time_column(row, 3)?,
        last_error: row.get(4)?,
    })
}

fn map_usage_row(row: &Row<'_>) -> rusqlite::Result<UsageRecord> {
    let id: String = row.get(0)?;
    let metadata_raw: String = row.get(2)?;

    let metadata =
        serde_json::from_str::<BTreeMap<String, String>>(&metadata_raw).unwrap_or_else(|err| {
            warn!(record_id = %id, error = %err, "failed to parse usage metadata, returning empty map");
            BTreeMap::new()
        });

    Ok(UsageRecord {
        id,
        resource_type: row.get(1)?,
        metadata,
        quantity: row.get(3)?,
        unit: row.get(4)?,
        price_rate: row.get(5)?,
        currency: row.get(6)?,
        sku: row.get(7)?,
        start_time: time_column(row, 8)?,
        end_time: time_column(row, 9)?,
    })
}

fn encode_metadata(metadata: &BTreeMap<String, String>) -> Result<String> {
    serde_json::to_string(metadata).map_err(|err| InfraError::from(err).into())
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    from_micros(idx, row.get(idx)?)
}

fn optional_time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<i64>>(idx)?.map(|micros| from_micros(idx, micros)).transpose()
}

/// Out-of-range values are conversion failures, never a silent epoch.
fn from_micros(idx: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Integer,
            Box::new(CostSyncError::Database(format!("timestamp out of range: {micros}"))),
        )
    })
}

fn map_join_error(err: task::JoinError) -> CostSyncError {
    if err.is_cancelled() {
        CostSyncError::Internal("workflow store task cancelled".into())
    } else {
        CostSyncError::Internal(format!("workflow store task panic: {err}"))
    }
}
