//! # costsync Infrastructure
//!
//! Infrastructure implementations of the core sync ports.
//!
//! This crate contains:
//! - SQLite workflow and usage store (r2d2 pool)
//! - Workflow runners and the controller that owns them
//! - Cached cost source decorator
//! - Configuration loading, metrics and logging setup
//!
//! ## Architecture
//! - Implements traits defined in `costsync-core`
//! - Contains all "impure" code (I/O, runtime tasks)

pub mod config;
pub mod database;
pub mod engine;
pub mod errors;
pub mod observability;
pub mod scheduling;
pub mod sources;

// Re-export commonly used items
pub use database::{DbManager, SqliteWorkflowStore};
pub use engine::SyncEngine;
pub use errors::InfraError;
pub use scheduling::{
    ProgressReceiver, RunnerConfig, SchedulerError, SchedulerResult, WorkflowController,
};
pub use sources::{CachedCostSource, StatsCacheConfig};
