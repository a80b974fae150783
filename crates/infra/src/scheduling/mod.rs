//! Workflow scheduling: one tokio task per active workflow
//!
//! Runtime rules followed by every component here:
//! - Join handles kept for spawned tasks
//! - Cancellation token per runner, plus a completion token fired on exit
//! - Registry lock never held across an `.await`
//! - Structured tracing with `SyncMetrics` integration

pub mod controller;
pub mod error;
pub mod registry;
pub mod runner;

pub use controller::WorkflowController;
pub use error::{SchedulerError, SchedulerResult};
pub use registry::{WorkflowDescriptor, WorkflowRegistry};
pub use runner::{ProgressReceiver, RunnerConfig, RunnerContext, WorkflowRunner};
