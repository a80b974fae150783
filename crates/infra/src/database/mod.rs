//! SQLite persistence for workflows and synced usage

pub mod manager;
pub mod workflow_repository;

pub use manager::{DbManager, SqliteConnection};
pub use workflow_repository::SqliteWorkflowStore;
