//! Scheduled-poll bookkeeping.
//!
//! Every in-flight backend job has one polling loop. Instead of a bare
//! "sleep and call yourself again" recursion, the loops are registered
//! here so pending polls can be enumerated, cancelled when the user
//! deletes a task, and drained on shutdown.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use atelier_core::types::TaskId;

/// One registered polling loop.
struct ScheduledPoll {
    /// Monotonic registration id: a retry replaces the entry, and the
    /// superseded loop must not remove its successor on exit.
    generation: u64,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct SchedulerInner {
    polls: HashMap<TaskId, ScheduledPoll>,
    next_generation: u64,
}

/// Cancellable handle table for per-task polling loops.
pub struct PollScheduler {
    inner: Mutex<SchedulerInner>,
    /// Master token -- cancelled during shutdown.
    root: CancellationToken,
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PollScheduler {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SchedulerInner::default()),
            root: CancellationToken::new(),
        }
    }

    /// Spawn the polling loop for a task.
    ///
    /// The loop receives a child token of the master token; cancelling
    /// either stops it at the next suspension point. Scheduling again
    /// for the same task (a retry) cancels the superseded loop.
    pub fn schedule<F, Fut>(self: &Arc<Self>, task_id: TaskId, poll: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.root.child_token();
        let generation = {
            let mut inner = self.inner.lock().expect("scheduler mutex poisoned");
            let generation = inner.next_generation;
            inner.next_generation += 1;
            if let Some(previous) = inner.polls.insert(
                task_id,
                ScheduledPoll {
                    generation,
                    cancel: cancel.clone(),
                    handle: None,
                },
            ) {
                previous.cancel.cancel();
            }
            generation
        };

        let future = poll(cancel);
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            future.await;
            scheduler.finish(task_id, generation);
        });

        let mut inner = self.inner.lock().expect("scheduler mutex poisoned");
        if let Some(entry) = inner.polls.get_mut(&task_id) {
            if entry.generation == generation {
                entry.handle = Some(handle);
            }
        }
    }

    /// Cancel the poll for a task. Returns `false` when none is active.
    pub fn cancel(&self, task_id: TaskId) -> bool {
        let inner = self.inner.lock().expect("scheduler mutex poisoned");
        match inner.polls.get(&task_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Task ids with an active polling loop.
    pub fn active(&self) -> Vec<TaskId> {
        self.inner
            .lock()
            .expect("scheduler mutex poisoned")
            .polls
            .keys()
            .copied()
            .collect()
    }

    /// Cancel everything and wait for the loops to exit.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let handles: Vec<_> = {
            let mut inner = self.inner.lock().expect("scheduler mutex poisoned");
            inner
                .polls
                .drain()
                .filter_map(|(_, entry)| entry.handle)
                .collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Remove a finished loop's own registration.
    fn finish(&self, task_id: TaskId, generation: u64) {
        let mut inner = self.inner.lock().expect("scheduler mutex poisoned");
        if inner
            .polls
            .get(&task_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            inner.polls.remove(&task_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn finished_poll_deregisters_itself() {
        let scheduler = Arc::new(PollScheduler::new());
        let task_id = TaskId::new_v4();

        scheduler.schedule(task_id, |_cancel| async {});

        // Give the spawned loop a moment to run and deregister.
        for _ in 0..100 {
            if scheduler.active().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(scheduler.active().is_empty());
    }

    #[tokio::test]
    async fn cancel_stops_a_waiting_poll() {
        let scheduler = Arc::new(PollScheduler::new());
        let task_id = TaskId::new_v4();

        scheduler.schedule(task_id, |cancel| async move {
            cancel.cancelled().await;
        });
        assert_eq!(scheduler.active(), [task_id]);

        assert!(scheduler.cancel(task_id));
        for _ in 0..100 {
            if scheduler.active().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(scheduler.active().is_empty());
    }

    #[tokio::test]
    async fn cancel_of_unknown_task_reports_false() {
        let scheduler = Arc::new(PollScheduler::new());
        assert!(!scheduler.cancel(TaskId::new_v4()));
    }

    #[tokio::test]
    async fn rescheduling_replaces_the_previous_loop() {
        let scheduler = Arc::new(PollScheduler::new());
        let task_id = TaskId::new_v4();

        scheduler.schedule(task_id, |cancel| async move {
            cancel.cancelled().await;
        });
        scheduler.schedule(task_id, |cancel| async move {
            cancel.cancelled().await;
        });

        // The superseded loop exits without deregistering its successor.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(scheduler.active(), [task_id]);

        scheduler.shutdown().await;
        assert!(scheduler.active().is_empty());
    }
}
