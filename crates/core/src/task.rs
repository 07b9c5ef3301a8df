//! Generation task record and lifecycle state machine.
//!
//! A [`GenerationTask`] is one user-visible unit of work: a prompt, a
//! frozen configuration snapshot, and a status that only ever moves
//! forward (`Processing -> Done` or `Processing -> Error`). Terminal
//! states are left only through an explicit user retry, which resets
//! the task in place.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::generation::GenerationConfig;
use crate::reference::ReferenceAsset;
use crate::types::{Credits, TaskId, Timestamp};

// ---------------------------------------------------------------------------
// Status state machine
// ---------------------------------------------------------------------------

/// Lifecycle status of a generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted (or about to be submitted) and not yet resolved.
    Processing,
    /// The backend or provider returned at least one output asset.
    Done,
    /// The job failed, the submission was rejected, or the provider
    /// returned nothing.
    Error,
}

impl TaskStatus {
    /// Whether this status admits no further forward transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Error)
    }
}

/// Returns the set of valid target statuses reachable from `from`.
///
/// Terminal states return an empty slice: the only way out of `Error`
/// is an explicit retry (handled by [`GenerationTask::begin_retry`],
/// not by a forward transition), and the only way out of `Done` is
/// deletion.
pub fn valid_transitions(from: TaskStatus) -> &'static [TaskStatus] {
    match from {
        TaskStatus::Processing => &[TaskStatus::Done, TaskStatus::Error],
        TaskStatus::Done | TaskStatus::Error => &[],
    }
}

/// Check whether a forward transition from `from` to `to` is valid.
pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    valid_transitions(from).contains(&to)
}

/// Validate a forward transition, returning a [`CoreError::Validation`]
/// describing the rejected move.
pub fn validate_transition(from: TaskStatus, to: TaskStatus) -> Result<(), CoreError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid task transition: {from:?} -> {to:?}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Payment channel
// ---------------------------------------------------------------------------

/// How a task is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    /// Metered backend; cost is debited from the credit ledger on
    /// acceptance and refunded once on failure.
    Credits,
    /// The user's own provider credential; the ledger is never touched
    /// and the recorded cost is pinned to zero.
    PersonalKey,
}

// ---------------------------------------------------------------------------
// Log lines
// ---------------------------------------------------------------------------

/// One append-only trace line in a task's log.
///
/// Logs exist for observability only; nothing reads them back for
/// control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub at: Timestamp,
    pub message: String,
}

impl LogLine {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Task record
// ---------------------------------------------------------------------------

/// Display format for the user-facing creation timestamp.
const CREATED_LABEL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One trackable generation request and its lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationTask {
    /// Stable internal identifier. Never changes, even when the backend
    /// assigns its own job id.
    pub id: TaskId,
    /// Backend-assigned job id, bound on successful submission.
    pub job_id: Option<String>,
    /// The text directive for this task.
    pub prompt: String,
    pub status: TaskStatus,
    /// Reference to the produced asset; `Some` if and only if `Done`.
    pub url: Option<String>,
    /// Configuration snapshot frozen at creation; retries reuse it.
    pub config: GenerationConfig,
    /// Credits debited for this task (0 on the personal-key channel).
    pub cost: Credits,
    pub paid_with: PaymentChannel,
    /// Whether the cost has actually been debited from the ledger.
    /// Submission rejection happens before the debit, so a failed task
    /// is only refund-eligible once this is set.
    pub debited: bool,
    /// Guards the at-most-once refund.
    pub is_refunded: bool,
    /// Reference assets attached at submission time.
    pub references: Vec<ReferenceAsset>,
    /// Append-only lifecycle trace.
    pub logs: Vec<LogLine>,
    pub created_at: Timestamp,
    /// User-facing formatted creation time.
    pub created_label: String,
}

impl GenerationTask {
    /// Create a new task in `Processing` state, before any I/O.
    pub fn new(
        prompt: impl Into<String>,
        config: GenerationConfig,
        references: Vec<ReferenceAsset>,
        cost: Credits,
        paid_with: PaymentChannel,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            id: TaskId::new_v4(),
            job_id: None,
            prompt: prompt.into(),
            status: TaskStatus::Processing,
            url: None,
            config,
            cost,
            paid_with,
            debited: false,
            is_refunded: false,
            references,
            logs: Vec::new(),
            created_at,
            created_label: created_at.format(CREATED_LABEL_FORMAT).to_string(),
        }
    }

    /// Append a trace line.
    pub fn push_log(&mut self, message: impl Into<String>) {
        self.logs.push(LogLine::new(message));
    }

    /// Bind the backend-assigned job id. The internal id is untouched;
    /// all lookups keep addressing the task by [`GenerationTask::id`].
    pub fn bind_job_id(&mut self, job_id: impl Into<String>) {
        self.job_id = Some(job_id.into());
    }

    /// Record that the ledger debit intent for this task was issued.
    pub fn mark_debited(&mut self) {
        self.debited = true;
    }

    /// Transition `Processing -> Done` with the produced asset.
    pub fn mark_done(&mut self, url: impl Into<String>) -> Result<(), CoreError> {
        validate_transition(self.status, TaskStatus::Done)?;
        self.status = TaskStatus::Done;
        self.url = Some(url.into());
        Ok(())
    }

    /// Transition `Processing -> Error`. The asset reference is cleared
    /// to preserve the `url` iff `Done` invariant.
    pub fn mark_failed(&mut self) -> Result<(), CoreError> {
        validate_transition(self.status, TaskStatus::Error)?;
        self.status = TaskStatus::Error;
        self.url = None;
        Ok(())
    }

    /// Claim the at-most-once refund for a failed credits-paid task.
    ///
    /// Returns the amount to credit back, or `None` when no refund is
    /// owed (personal-key channel, zero cost, never debited, or already
    /// refunded). Flips `is_refunded` so a second error classification
    /// cannot double-refund.
    pub fn take_refund(&mut self) -> Option<Credits> {
        if self.paid_with != PaymentChannel::Credits
            || self.cost <= 0
            || !self.debited
            || self.is_refunded
        {
            return None;
        }
        self.is_refunded = true;
        Some(self.cost)
    }

    /// Reset a failed task for a user-initiated retry.
    ///
    /// Only valid from `Error`. Re-enters `Processing`, clears the
    /// refund/debit guards and the stale job binding, and keeps the
    /// original prompt, configuration, references, and cost.
    pub fn begin_retry(&mut self) -> Result<(), CoreError> {
        if self.status != TaskStatus::Error {
            return Err(CoreError::Validation(format!(
                "Only failed tasks can be retried (status is {:?})",
                self.status
            )));
        }
        self.status = TaskStatus::Processing;
        self.url = None;
        self.job_id = None;
        self.debited = false;
        self.is_refunded = false;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationConfig;

    fn task(paid_with: PaymentChannel, cost: Credits) -> GenerationTask {
        GenerationTask::new(
            "a quiet harbour at dawn",
            GenerationConfig::default(),
            Vec::new(),
            cost,
            paid_with,
        )
    }

    // -- transitions --

    #[test]
    fn processing_reaches_both_terminals() {
        assert!(can_transition(TaskStatus::Processing, TaskStatus::Done));
        assert!(can_transition(TaskStatus::Processing, TaskStatus::Error));
    }

    #[test]
    fn terminal_states_have_no_forward_transitions() {
        assert!(valid_transitions(TaskStatus::Done).is_empty());
        assert!(valid_transitions(TaskStatus::Error).is_empty());
    }

    #[test]
    fn done_task_rejects_failure() {
        let mut t = task(PaymentChannel::Credits, 5);
        t.mark_done("https://cdn.example/out.png").unwrap();
        assert!(t.mark_failed().is_err());
        assert_eq!(t.status, TaskStatus::Done);
    }

    #[test]
    fn failed_task_rejects_done() {
        let mut t = task(PaymentChannel::Credits, 5);
        t.mark_failed().unwrap();
        assert!(t.mark_done("https://cdn.example/out.png").is_err());
        assert_eq!(t.status, TaskStatus::Error);
        assert!(t.url.is_none());
    }

    #[test]
    fn url_set_iff_done() {
        let mut t = task(PaymentChannel::Credits, 5);
        assert!(t.url.is_none());
        t.mark_done("https://cdn.example/out.png").unwrap();
        assert_eq!(t.url.as_deref(), Some("https://cdn.example/out.png"));
    }

    // -- refunds --

    #[test]
    fn refund_claimed_exactly_once() {
        let mut t = task(PaymentChannel::Credits, 8);
        t.mark_debited();
        t.mark_failed().unwrap();
        assert_eq!(t.take_refund(), Some(8));
        assert!(t.is_refunded);
        assert_eq!(t.take_refund(), None);
    }

    #[test]
    fn no_refund_before_debit() {
        // Submission rejection fails the task before any debit happened.
        let mut t = task(PaymentChannel::Credits, 8);
        t.mark_failed().unwrap();
        assert_eq!(t.take_refund(), None);
        assert!(!t.is_refunded);
    }

    #[test]
    fn personal_key_tasks_never_refund() {
        let mut t = task(PaymentChannel::PersonalKey, 0);
        t.mark_debited();
        t.mark_failed().unwrap();
        assert_eq!(t.take_refund(), None);
    }

    // -- retry --

    #[test]
    fn retry_resets_guards_and_binding() {
        let mut t = task(PaymentChannel::Credits, 8);
        t.bind_job_id("job-123");
        t.mark_debited();
        t.mark_failed().unwrap();
        t.take_refund();

        t.begin_retry().unwrap();
        assert_eq!(t.status, TaskStatus::Processing);
        assert!(t.job_id.is_none());
        assert!(!t.debited);
        assert!(!t.is_refunded);
        assert!(t.url.is_none());
        // The snapshot survives.
        assert_eq!(t.cost, 8);
        assert_eq!(t.prompt, "a quiet harbour at dawn");
    }

    #[test]
    fn retry_rejected_from_done_and_processing() {
        let mut done = task(PaymentChannel::Credits, 5);
        done.mark_done("https://cdn.example/out.png").unwrap();
        assert!(done.begin_retry().is_err());

        let mut processing = task(PaymentChannel::Credits, 5);
        assert!(processing.begin_retry().is_err());
    }

    // -- logs --

    #[test]
    fn logs_append_in_order() {
        let mut t = task(PaymentChannel::Credits, 5);
        t.push_log("first");
        t.push_log("second");
        let messages: Vec<_> = t.logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, ["first", "second"]);
    }
}
