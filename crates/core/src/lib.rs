//! # costsync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces for the cost source and the workflow store
//! - Window arithmetic, start-time resolution and batch deduplication
//!
//! ## Architecture Principles
//! - Only depends on `costsync-domain`
//! - No database, HTTP, or runtime code
//! - All external dependencies via traits

pub mod sync;

pub use sync::ports::{CostSource, WorkflowPersistence};
pub use sync::window::{dedup_by_id, resolve_start_time, SyncWindow};
