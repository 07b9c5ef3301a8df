//! The orchestrator facade.
//!
//! [`Orchestrator`] composes the registry, the poll scheduler, the
//! gateway clients, and the credit ledger into the studio's "generate",
//! "retry", "delete", and cost-preview operations. Created once per
//! session and shared via `Arc`.

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use atelier_core::cost::{total_cost, unit_cost_or_zero, PricingResolver, PromptPlan};
use atelier_core::error::CoreError;
use atelier_core::generation::{validate_config, GenerationConfig};
use atelier_core::ledger::CreditLedger;
use atelier_core::reference::{validate_reference_upload, ReferenceAsset};
use atelier_core::task::{GenerationTask, PaymentChannel, TaskStatus};
use atelier_core::types::{Credits, TaskId};
use atelier_events::{EventBus, StudioEvent};
use atelier_gateway::backend::GenerationBackend;
use atelier_gateway::provider::DirectProvider;
use atelier_gateway::uploader::AssetUploader;

use crate::config::OrchestratorConfig;
use crate::intake::ReferenceIntake;
use crate::registry::TaskRegistry;
use crate::runtime::TaskRuntime;
use crate::scheduler::PollScheduler;
use crate::submit::submit_task;

// ---------------------------------------------------------------------------
// Request type
// ---------------------------------------------------------------------------

/// One user-initiated generate action.
///
/// May create several tasks (a batch); every task snapshots the same
/// configuration but carries its own prompt and advances independently.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub plan: PromptPlan,
    pub config: GenerationConfig,
    pub channel: PaymentChannel,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Session-scoped generation orchestrator.
pub struct Orchestrator {
    runtime: Arc<TaskRuntime>,
    pricing: Arc<dyn PricingResolver>,
    uploader: Arc<dyn AssetUploader>,
    intake: ReferenceIntake,
    personal_key: RwLock<Option<String>>,
}

impl Orchestrator {
    /// Wire up an orchestrator. The returned `Arc` is safe to clone
    /// into whatever surface renders the task list.
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        provider: Arc<dyn DirectProvider>,
        uploader: Arc<dyn AssetUploader>,
        ledger: Arc<dyn CreditLedger>,
        pricing: Arc<dyn PricingResolver>,
        events: Arc<EventBus>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        let max_references = config.max_references;
        let runtime = Arc::new(TaskRuntime {
            registry: Arc::new(TaskRegistry::new()),
            scheduler: Arc::new(PollScheduler::new()),
            ledger,
            backend,
            provider,
            events,
            config,
        });
        Arc::new(Self {
            runtime,
            pricing,
            uploader,
            intake: ReferenceIntake::new(max_references),
            personal_key: RwLock::new(None),
        })
    }

    // ---- generate ----

    /// Create and submit a batch of tasks.
    ///
    /// Pre-flight validation happens before any task exists: an empty
    /// prompt set, a missing model, a missing personal key, or an
    /// insufficient balance rejects the whole action without touching
    /// the registry. Tasks then enter the registry synchronously in
    /// `Processing` state and all submissions fire concurrently; the
    /// call returns once every submission has been delivered, while
    /// polling continues in the background.
    pub async fn generate(&self, request: GenerateRequest) -> Result<Vec<TaskId>, CoreError> {
        let prompts = request.plan.expand();
        if prompts.is_empty() {
            return Err(CoreError::Validation(
                "At least one non-empty prompt is required".to_string(),
            ));
        }
        validate_config(&request.config)?;

        let cost_per_task = match request.channel {
            PaymentChannel::Credits => {
                let unit = unit_cost_or_zero(
                    self.pricing.as_ref(),
                    &request.config.model,
                    &request.config.resolution,
                );
                let required = unit * prompts.len() as Credits;
                let available = self.runtime.ledger.balance().await;
                if available < required {
                    return Err(CoreError::InsufficientCredits {
                        required,
                        available,
                    });
                }
                unit
            }
            PaymentChannel::PersonalKey => {
                if self.personal_key.read().await.is_none() {
                    return Err(CoreError::Validation(
                        "A personal API key must be configured for this channel".to_string(),
                    ));
                }
                0
            }
        };

        let references = self.intake.list().await;
        let personal_key = self.personal_key.read().await.clone();

        let mut task_ids = Vec::with_capacity(prompts.len());
        let mut submissions = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let task = GenerationTask::new(
                prompt,
                request.config.clone(),
                references.clone(),
                cost_per_task,
                request.channel,
            );
            task_ids.push(task.id);
            self.runtime.registry.insert(task.clone()).await;
            self.runtime
                .events
                .publish(StudioEvent::TaskUpdated { task_id: task.id });

            submissions.push(submit_task(
                Arc::clone(&self.runtime),
                task,
                personal_key.clone(),
            ));
        }

        // One slow or failing submission must not block its siblings.
        futures::future::join_all(submissions).await;

        Ok(task_ids)
    }

    // ---- retry / delete ----

    /// Re-issue a failed task with its original snapshot.
    pub async fn retry(&self, task_id: TaskId) -> Result<(), CoreError> {
        let task = self.runtime.registry.begin_retry(task_id).await?;
        self.runtime
            .events
            .publish(StudioEvent::TaskUpdated { task_id });

        let personal_key = self.personal_key.read().await.clone();
        submit_task(Arc::clone(&self.runtime), task, personal_key).await;
        Ok(())
    }

    /// Remove a task from the session.
    ///
    /// Cancels its polling loop; any update already racing the removal
    /// degrades to a no-op inside the registry.
    pub async fn delete(&self, task_id: TaskId) -> bool {
        self.runtime.scheduler.cancel(task_id);
        let removed = self.runtime.registry.remove(task_id).await;
        if removed {
            self.runtime
                .events
                .publish(StudioEvent::TaskUpdated { task_id });
        }
        removed
    }

    // ---- queries ----

    /// All tasks in creation order.
    pub async fn tasks(&self) -> Vec<GenerationTask> {
        self.runtime.registry.snapshot().await
    }

    /// One task by its stable id.
    pub async fn task(&self, task_id: TaskId) -> Option<GenerationTask> {
        self.runtime.registry.get(task_id).await
    }

    /// Tasks still in flight.
    pub async fn processing_count(&self) -> usize {
        self.runtime
            .registry
            .snapshot()
            .await
            .iter()
            .filter(|t| t.status == TaskStatus::Processing)
            .count()
    }

    /// Total cost the next generate action would debit.
    ///
    /// Recomputed by the caller whenever model, resolution, quantity,
    /// or the batch prompt list changes; the personal-key channel is
    /// always free.
    pub fn preview_cost(&self, request: &GenerateRequest) -> Credits {
        match request.channel {
            PaymentChannel::Credits => total_cost(
                self.pricing.as_ref(),
                &request.config.model,
                &request.config.resolution,
                &request.plan,
            ),
            PaymentChannel::PersonalKey => 0,
        }
    }

    /// Task ids with an active polling loop (visible for tests and
    /// diagnostics).
    pub fn active_polls(&self) -> Vec<TaskId> {
        self.runtime.scheduler.active()
    }

    /// Subscribe to studio events.
    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.runtime.events.subscribe()
    }

    // ---- personal key ----

    pub async fn set_personal_key(&self, key: impl Into<String>) {
        *self.personal_key.write().await = Some(key.into());
    }

    pub async fn clear_personal_key(&self) {
        *self.personal_key.write().await = None;
    }

    // ---- reference intake ----

    /// Validate and upload a reference file, then append it to the
    /// active reference list.
    ///
    /// `preview_url` is the caller's local preview, exposed through
    /// [`Orchestrator::upload_in_flight`] while the transfer runs. On
    /// any failure the user keeps their current list unchanged.
    pub async fn attach_reference(
        &self,
        bytes: Vec<u8>,
        mime: &str,
        preview_url: &str,
    ) -> Result<ReferenceAsset, CoreError> {
        validate_reference_upload(&bytes, mime)?;
        self.intake.begin(preview_url).await?;

        match self.uploader.upload(bytes, mime).await {
            Ok(stored) => {
                let asset = ReferenceAsset {
                    url: stored.url,
                    media_id: stored.media_id,
                };
                self.intake.complete(asset.clone()).await;
                Ok(asset)
            }
            Err(e) => {
                self.intake.abort().await;
                Err(CoreError::Internal(format!("Reference upload failed: {e}")))
            }
        }
    }

    /// The active reference list for the next submission.
    pub async fn references(&self) -> Vec<ReferenceAsset> {
        self.intake.list().await
    }

    /// Local preview URL of the upload currently in flight, if any.
    pub async fn upload_in_flight(&self) -> Option<String> {
        self.intake.uploading().await
    }

    /// Remove a reference by list position.
    pub async fn remove_reference(&self, index: usize) -> bool {
        self.intake.remove(index).await
    }

    // ---- shutdown ----

    /// Cancel all polling loops and wait for them to exit.
    pub async fn shutdown(&self) {
        self.runtime.scheduler.shutdown().await;
    }
}
