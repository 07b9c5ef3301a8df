//! Polling loop for in-flight backend jobs.
//!
//! Each accepted job gets one loop: query status, classify, act,
//! sleep, repeat. A job-level error or a completed result ends the
//! loop; a transport failure only stretches the delay. Every update is
//! guarded against the task having been deleted mid-flight.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use atelier_core::types::TaskId;
use atelier_events::StudioEvent;
use atelier_gateway::payload::{classify, JobPhase};

use crate::registry::{DoneOutcome, FailOutcome};
use crate::runtime::TaskRuntime;

/// Drive one backend job to a terminal classification.
///
/// Runs until the job completes or fails, the poll deadline expires,
/// the task disappears from the registry, or the token is cancelled.
pub(crate) async fn poll_job(
    rt: Arc<TaskRuntime>,
    task_id: TaskId,
    job_id: String,
    cancel: CancellationToken,
) {
    let deadline = rt
        .config
        .max_poll_duration
        .map(|limit| tokio::time::Instant::now() + limit);

    loop {
        if cancel.is_cancelled() {
            return;
        }

        let delay = match rt.backend.job_status(&job_id).await {
            Ok(response) => match classify(&response) {
                JobPhase::Completed { url } => {
                    finish_done(&rt, task_id, &job_id, &url).await;
                    return;
                }
                JobPhase::Failed { message } => {
                    let reason = message.unwrap_or_else(|| "Job failed".to_string());
                    finish_failed(&rt, task_id, &format!("Job {job_id} failed: {reason}")).await;
                    return;
                }
                JobPhase::Pending { status } => {
                    tracing::debug!(task_id = %task_id, job_id = %job_id, status = %status, "Job still pending");
                    if !rt
                        .registry
                        .append_log(task_id, format!("Job {job_id} status: {status}"))
                        .await
                    {
                        tracing::debug!(task_id = %task_id, "Task deleted; stopping poll");
                        return;
                    }
                    rt.events.publish(StudioEvent::TaskUpdated { task_id });
                    rt.config.pending_poll_delay
                }
            },
            // The status query itself failed. That says nothing about
            // the job, so keep polling on the longer cadence.
            Err(e) => {
                tracing::warn!(task_id = %task_id, job_id = %job_id, error = %e, "Status query failed; retrying");
                if !rt
                    .registry
                    .append_log(
                        task_id,
                        format!("Connection problem while checking job {job_id}: {e}. Retrying."),
                    )
                    .await
                {
                    return;
                }
                rt.events.publish(StudioEvent::TaskUpdated { task_id });
                rt.config.transport_retry_delay
            }
        };

        if let Some(deadline) = deadline {
            if tokio::time::Instant::now() >= deadline {
                finish_failed(
                    &rt,
                    task_id,
                    &format!("Gave up waiting for job {job_id} to finish"),
                )
                .await;
                return;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Apply a completed result: set the asset, log, and fire the
/// best-effort refresh hints.
async fn finish_done(rt: &TaskRuntime, task_id: TaskId, job_id: &str, url: &str) {
    match rt.registry.mark_done(task_id, url).await {
        DoneOutcome::Done => {
            rt.registry
                .append_log(task_id, format!("Job {job_id} finished"))
                .await;
            tracing::info!(task_id = %task_id, job_id = %job_id, "Generation completed");
            rt.events.publish(StudioEvent::TaskUpdated { task_id });
            rt.events.publish(StudioEvent::BalanceRefreshRequested);
            rt.events.publish(StudioEvent::HistoryResyncRequested);
        }
        DoneOutcome::AlreadyTerminal => {
            tracing::debug!(task_id = %task_id, "Ignoring duplicate completion");
        }
        DoneOutcome::Missing => {}
    }
}

/// Apply a job-level failure: log, refund at most once, and mark the
/// task failed.
pub(crate) async fn finish_failed(rt: &TaskRuntime, task_id: TaskId, reason: &str) {
    match rt.registry.mark_failed(task_id).await {
        FailOutcome::Failed { refund } => {
            rt.registry.append_log(task_id, reason).await;
            tracing::error!(task_id = %task_id, reason = %reason, "Generation failed");

            if let Some(amount) = refund {
                // Credit intent only -- the ledger serializes the
                // adjustment; we do not re-check the balance.
                if let Err(e) = rt.ledger.credit(amount).await {
                    tracing::warn!(task_id = %task_id, error = %e, "Refund intent failed");
                } else {
                    rt.registry
                        .append_log(task_id, format!("{amount} credits refunded"))
                        .await;
                }
            }

            rt.events.publish(StudioEvent::TaskUpdated { task_id });
        }
        FailOutcome::AlreadyTerminal => {
            tracing::debug!(task_id = %task_id, "Ignoring duplicate failure");
        }
        FailOutcome::Missing => {}
    }
}
