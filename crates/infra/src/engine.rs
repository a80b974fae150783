//! Engine wiring
//!
//! Opens and migrates the local store, then builds a [`WorkflowController`]
//! from a [`Config`] plus the caller's cost source.

use std::sync::Arc;

use costsync_core::{CostSource, WorkflowPersistence};
use costsync_domain::{Config, Result};
use tracing::info;

use crate::database::{DbManager, SqliteWorkflowStore};
use crate::observability::metrics::SyncMetrics;
use crate::scheduling::{RunnerConfig, WorkflowController};
use crate::sources::{CachedCostSource, StatsCacheConfig};

/// Fully wired sync engine
pub struct SyncEngine {
    db: Arc<DbManager>,
    store: Arc<SqliteWorkflowStore>,
    controller: WorkflowController,
}

impl SyncEngine {
    /// Build the engine described by `config` on top of `source`.
    ///
    /// Usage stats are cached unless `sync.stats_cache_ttl_seconds` is zero.
    ///
    /// # Errors
    /// Returns `CostSyncError::Config` for invalid intervals and
    /// `CostSyncError::Database` if the store cannot be opened, migrated or
    /// queried.
    pub fn from_config(config: &Config, source: Arc<dyn CostSource>) -> Result<Self> {
        let runner_config = RunnerConfig::from_sync_config(&config.sync)?;

        let db = Arc::new(DbManager::from_config(&config.database)?);
        db.run_migrations()?;
        db.health_check()?;
        let store = Arc::new(SqliteWorkflowStore::new(Arc::clone(&db)));

        let source: Arc<dyn CostSource> = match StatsCacheConfig::from_sync_config(&config.sync) {
            Some(cache_config) => Arc::new(CachedCostSource::new(source, cache_config)),
            None => source,
        };

        let persistence: Arc<dyn WorkflowPersistence> = store.clone();
        let controller = WorkflowController::new(
            persistence,
            source,
            runner_config,
            Arc::new(SyncMetrics::new()),
        );

        info!(
            db_path = %db.path().display(),
            batch_interval_seconds = config.sync.batch_interval_seconds,
            poll_interval_seconds = config.sync.poll_interval_seconds,
            "sync engine ready"
        );

        Ok(Self { db, store, controller })
    }

    pub fn controller(&self) -> &WorkflowController {
        &self.controller
    }

    /// Direct access to the store, e.g. for reading synced usage.
    pub fn store(&self) -> &Arc<SqliteWorkflowStore> {
        &self.store
    }

    pub fn db(&self) -> &Arc<DbManager> {
        &self.db
    }

    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        self.controller.metrics()
    }
}
