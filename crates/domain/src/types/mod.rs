//! Domain types and models

pub mod usage;
pub mod workflow;

pub use usage::{RunnerProgress, UsageRecord, UsageStats};
pub use workflow::{Workflow, WorkflowStatus};
