//! Registry of active runners keyed by workflow id.
//!
//! One `parking_lot::Mutex` guards the map. Every operation takes the lock
//! for a short synchronous section and never across an `.await`; callers get
//! cloned tokens or owned descriptors back, never the map itself.

use std::collections::HashMap;

use costsync_domain::Workflow;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::runner::ProgressReceiver;

/// Handle on one active runner
pub struct WorkflowDescriptor {
    pub workflow: Workflow,
    pub cancel: CancellationToken,
    pub done: CancellationToken,
    pub progress: ProgressReceiver,
    pub handle: JoinHandle<()>,
    generation: u64,
}

impl WorkflowDescriptor {
    pub fn new(
        workflow: Workflow,
        cancel: CancellationToken,
        done: CancellationToken,
        progress: ProgressReceiver,
        handle: JoinHandle<()>,
    ) -> Self {
        Self { workflow, cancel, done, progress, handle, generation: 0 }
    }

    /// True once the runner task has exited.
    pub fn is_finished(&self) -> bool {
        self.done.is_cancelled()
    }
}

/// Signals needed to stop a runner without holding the registry lock
#[derive(Debug, Clone)]
pub struct StopSignals {
    pub cancel: CancellationToken,
    pub done: CancellationToken,
    pub generation: u64,
}

#[derive(Default)]
struct RegistryState {
    runners: HashMap<String, WorkflowDescriptor>,
    next_generation: u64,
}

/// Concurrency-safe map of workflow id to runner descriptor
#[derive(Default)]
pub struct WorkflowRegistry {
    state: Mutex<RegistryState>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the descriptor built by `start` unless a live runner already
    /// holds `id`.
    ///
    /// `start` runs under the lock, so it must not block. A descriptor whose
    /// runner already exited is replaced. Returns `false` when `id` is taken.
    pub fn insert_if_absent<F>(&self, id: &str, start: F) -> bool
    where
        F: FnOnce() -> WorkflowDescriptor,
    {
        let mut state = self.state.lock();
        if state.runners.get(id).is_some_and(|existing| !existing.is_finished()) {
            return false;
        }

        let mut descriptor = start();
        state.next_generation += 1;
        descriptor.generation = state.next_generation;
        state.runners.insert(id.to_string(), descriptor);
        true
    }

    /// Cloned stop signals for `id`, if registered.
    pub fn stop_signals(&self, id: &str) -> Option<StopSignals> {
        self.state.lock().runners.get(id).map(|descriptor| StopSignals {
            cancel: descriptor.cancel.clone(),
            done: descriptor.done.clone(),
            generation: descriptor.generation,
        })
    }

    /// Remove `id` only if it still belongs to the runner `generation`
    /// refers to.
    pub fn remove(&self, id: &str, generation: u64) -> Option<WorkflowDescriptor> {
        let mut state = self.state.lock();
        if state.runners.get(id).is_some_and(|descriptor| descriptor.generation == generation) {
            state.runners.remove(id)
        } else {
            None
        }
    }

    /// Take every descriptor out of the registry.
    pub fn drain(&self) -> Vec<(String, WorkflowDescriptor)> {
        self.state.lock().runners.drain().collect()
    }

    pub fn contains_live(&self, id: &str) -> bool {
        self.state.lock().runners.get(id).is_some_and(|descriptor| !descriptor.is_finished())
    }

    pub fn progress(&self, id: &str) -> Option<ProgressReceiver> {
        self.state.lock().runners.get(id).map(|descriptor| descriptor.progress.clone())
    }

    /// Ids of runners that have not exited, sorted.
    pub fn live_ids(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut ids: Vec<String> = state
            .runners
            .iter()
            .filter(|(_, descriptor)| !descriptor.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Signal every registered runner to stop without waiting.
    pub fn cancel_all(&self) {
        for descriptor in self.state.lock().runners.values() {
            descriptor.cancel.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
