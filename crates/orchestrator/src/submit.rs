//! Dual-channel job submission.
//!
//! A resolved task goes out either through the metered backend (debit
//! on acceptance, then hand off to the poller) or through the direct
//! provider with the user's personal key (resolves in one call, never
//! touches the ledger).

use std::sync::Arc;

use atelier_core::engine::ReferenceMode;
use atelier_core::reference::encode_references;
use atelier_core::task::{GenerationTask, PaymentChannel};
use atelier_events::StudioEvent;
use atelier_gateway::backend::SubmitOutcome;
use atelier_gateway::payload::build_submit_request;
use atelier_gateway::provider::{DirectProviderError, DirectRequest};

use crate::poller::{finish_failed, poll_job};
use crate::registry::DoneOutcome;
use crate::runtime::TaskRuntime;

/// Submit one task on its payment channel.
///
/// `task` is the frozen snapshot taken at creation (or retry) time;
/// the live record is only touched through the registry so a deletion
/// racing this call degrades to a no-op.
pub(crate) async fn submit_task(
    rt: Arc<TaskRuntime>,
    task: GenerationTask,
    personal_key: Option<String>,
) {
    match task.paid_with {
        PaymentChannel::Credits => submit_metered(rt, task).await,
        PaymentChannel::PersonalKey => submit_direct(rt, task, personal_key).await,
    }
}

// ---------------------------------------------------------------------------
// Credits channel
// ---------------------------------------------------------------------------

async fn submit_metered(rt: Arc<TaskRuntime>, task: GenerationTask) {
    let request = build_submit_request(
        &task.prompt,
        &task.config,
        &task.references,
        &rt.config.project_id,
    );

    rt.registry
        .append_log(task.id, format!("Submitting {} job", request.operation))
        .await;
    rt.events.publish(StudioEvent::TaskUpdated { task_id: task.id });

    match rt.backend.submit(&request).await {
        Ok(SubmitOutcome::Accepted { job_id }) => {
            // Rebind: from here on the backend id is what gets polled;
            // the internal id stays the registry key.
            if !rt.registry.bind_job_id(task.id, &job_id).await {
                // Deleted before acceptance landed. Nothing was
                // debited, so there is nothing to unwind.
                tracing::debug!(task_id = %task.id, "Task deleted before acceptance");
                return;
            }
            rt.registry
                .append_log(task.id, format!("Job accepted as {job_id}; provisioning"))
                .await;
            tracing::info!(task_id = %task.id, job_id = %job_id, "Job accepted");

            // Debit-on-accept: a rejected submission never costs the
            // user anything. The debit is an intent; the ledger owns
            // the balance.
            if task.cost > 0 {
                if let Err(e) = rt.ledger.debit(task.cost).await {
                    tracing::warn!(task_id = %task.id, error = %e, "Debit intent failed");
                }
                rt.registry.mark_debited(task.id).await;
            }

            rt.events.publish(StudioEvent::TaskUpdated { task_id: task.id });

            let poll_rt = Arc::clone(&rt);
            let task_id = task.id;
            rt.scheduler.schedule(task_id, move |cancel| {
                poll_job(poll_rt, task_id, job_id, cancel)
            });
        }
        Ok(SubmitOutcome::Rejected { message }) => {
            finish_failed(&rt, task.id, &format!("Submission rejected: {message}")).await;
        }
        Err(e) => {
            finish_failed(&rt, task.id, &format!("Submission failed: {e}")).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Personal-key channel
// ---------------------------------------------------------------------------

async fn submit_direct(rt: Arc<TaskRuntime>, task: GenerationTask, personal_key: Option<String>) {
    let Some(api_key) = personal_key else {
        // Pre-flight validation refuses this; guard anyway for retries
        // issued after the key was cleared.
        finish_failed(&rt, task.id, "No personal API key configured").await;
        return;
    };

    rt.registry
        .append_log(task.id, "Calling the provider directly")
        .await;
    rt.events.publish(StudioEvent::TaskUpdated { task_id: task.id });

    // The direct path always sends bare URLs regardless of the metered
    // engine's reference mode.
    let request = DirectRequest {
        prompt: task.prompt.clone(),
        images: encode_references(&task.references, ReferenceMode::Url),
        model: task.config.model.clone(),
        aspect_ratio: task.config.aspect_ratio.clone(),
        quality: task.config.resolution.clone(),
        api_key,
    };

    match rt.provider.generate(&request).await {
        Ok(Some(url)) => {
            if rt.registry.mark_done(task.id, &url).await == DoneOutcome::Done {
                rt.registry
                    .append_log(task.id, "Provider returned the finished asset")
                    .await;
                tracing::info!(task_id = %task.id, "Direct generation completed");
                rt.events.publish(StudioEvent::TaskUpdated { task_id: task.id });
            }
        }
        Ok(None) => {
            finish_failed(&rt, task.id, "Provider returned no asset").await;
        }
        Err(DirectProviderError::EntityNotFound) => {
            rt.events.publish(StudioEvent::ReauthRequired {
                provider: task.config.provider.clone(),
            });
            finish_failed(&rt, task.id, "Provider credential is no longer valid").await;
        }
        Err(e) => {
            finish_failed(&rt, task.id, &format!("Provider call failed: {e}")).await;
        }
    }
}
