//! Session task registry.
//!
//! Holds the ordered collection of generation tasks the user has
//! created in the current session. Every mutation is addressed by the
//! task's stable internal id and goes through a single write lock, so
//! interleaved poll callbacks cannot lose updates. Each method is a
//! silent no-op (reported through its return value) when the target
//! task has been deleted -- a poll callback racing a deletion must never
//! resurrect state.

use std::collections::HashMap;

use tokio::sync::RwLock;

use atelier_core::error::CoreError;
use atelier_core::task::GenerationTask;
use atelier_core::types::{Credits, TaskId};

/// Result of marking a task done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneOutcome {
    /// The task transitioned to `Done`.
    Done,
    /// The task was already terminal; nothing changed.
    AlreadyTerminal,
    /// The task has been deleted.
    Missing,
}

/// Result of marking a task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// The task transitioned to `Error`. When the task was paid via
    /// credits and had been debited, `refund` carries the amount to
    /// credit back -- claimed atomically, so it is returned at most once
    /// per debit.
    Failed { refund: Option<Credits> },
    /// The task was already terminal; nothing changed.
    AlreadyTerminal,
    /// The task has been deleted.
    Missing,
}

#[derive(Default)]
struct RegistryInner {
    tasks: HashMap<TaskId, GenerationTask>,
    /// Creation order, for stable presentation.
    order: Vec<TaskId>,
}

/// The orchestrator's own state: all tasks of the current session.
#[derive(Default)]
pub struct TaskRegistry {
    inner: RwLock<RegistryInner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly created task.
    pub async fn insert(&self, task: GenerationTask) {
        let mut inner = self.inner.write().await;
        inner.order.push(task.id);
        inner.tasks.insert(task.id, task);
    }

    /// Snapshot of all tasks in creation order.
    pub async fn snapshot(&self) -> Vec<GenerationTask> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id).cloned())
            .collect()
    }

    /// Snapshot of a single task.
    pub async fn get(&self, id: TaskId) -> Option<GenerationTask> {
        self.inner.read().await.tasks.get(&id).cloned()
    }

    /// Append a log line. Returns `false` if the task is gone.
    pub async fn append_log(&self, id: TaskId, message: impl Into<String>) -> bool {
        let mut inner = self.inner.write().await;
        match inner.tasks.get_mut(&id) {
            Some(task) => {
                task.push_log(message);
                true
            }
            None => false,
        }
    }

    /// Bind the backend-assigned job id to a task. Returns `false` if
    /// the task is gone.
    pub async fn bind_job_id(&self, id: TaskId, job_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.tasks.get_mut(&id) {
            Some(task) => {
                task.bind_job_id(job_id);
                true
            }
            None => false,
        }
    }

    /// Record that the debit intent for a task was issued.
    pub async fn mark_debited(&self, id: TaskId) -> bool {
        let mut inner = self.inner.write().await;
        match inner.tasks.get_mut(&id) {
            Some(task) => {
                task.mark_debited();
                true
            }
            None => false,
        }
    }

    /// Transition a task to `Done` with its produced asset.
    ///
    /// A task already in a terminal state is left untouched, which is
    /// what makes duplicate completion reports harmless.
    pub async fn mark_done(&self, id: TaskId, url: &str) -> DoneOutcome {
        let mut inner = self.inner.write().await;
        match inner.tasks.get_mut(&id) {
            Some(task) => match task.mark_done(url) {
                Ok(()) => DoneOutcome::Done,
                Err(_) => DoneOutcome::AlreadyTerminal,
            },
            None => DoneOutcome::Missing,
        }
    }

    /// Transition a task to `Error`, claiming the at-most-once refund
    /// under the same write lock.
    pub async fn mark_failed(&self, id: TaskId) -> FailOutcome {
        let mut inner = self.inner.write().await;
        match inner.tasks.get_mut(&id) {
            Some(task) => match task.mark_failed() {
                Ok(()) => FailOutcome::Failed {
                    refund: task.take_refund(),
                },
                Err(_) => FailOutcome::AlreadyTerminal,
            },
            None => FailOutcome::Missing,
        }
    }

    /// Reset a failed task for retry and return the snapshot to
    /// resubmit. The task keeps its registry position.
    pub async fn begin_retry(&self, id: TaskId) -> Result<GenerationTask, CoreError> {
        let mut inner = self.inner.write().await;
        let task = inner.tasks.get_mut(&id).ok_or_else(|| CoreError::NotFound {
            entity: "task",
            id: id.to_string(),
        })?;
        task.begin_retry()?;
        task.push_log("Retrying with the original settings");
        Ok(task.clone())
    }

    /// Remove a task. Returns `false` if it was already gone.
    pub async fn remove(&self, id: TaskId) -> bool {
        let mut inner = self.inner.write().await;
        inner.order.retain(|existing| *existing != id);
        inner.tasks.remove(&id).is_some()
    }

    /// Number of tasks currently in the registry.
    pub async fn len(&self) -> usize {
        self.inner.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
