//! Shared test fixtures: scripted in-memory fakes for every external
//! collaborator, plus a wired-up orchestrator harness with millisecond
//! polling delays.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;

use atelier_core::cost::{PricingResolver, PromptPlan};
use atelier_core::error::CoreError;
use atelier_core::generation::GenerationConfig;
use atelier_core::ledger::{CreditLedger, InMemoryLedger};
use atelier_core::task::{GenerationTask, PaymentChannel, TaskStatus};
use atelier_core::types::{Credits, TaskId};
use atelier_events::EventBus;
use atelier_gateway::backend::{BackendError, GenerationBackend, SubmitOutcome};
use atelier_gateway::payload::{JobError, JobResult, JobStatusResponse, SubmitJobRequest};
use atelier_gateway::provider::{DirectProvider, DirectProviderError, DirectRequest};
use atelier_gateway::uploader::{AssetUploader, StoredAsset, UploadError};
use atelier_orchestrator::{GenerateRequest, Orchestrator, OrchestratorConfig};

pub const UNIT_COST: Credits = 5;
pub const INITIAL_BALANCE: Credits = 100;

/// Minimal valid PNG header for reference-upload tests.
pub const PNG_HEADER: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
];

// ---------------------------------------------------------------------------
// Scripted status steps
// ---------------------------------------------------------------------------

/// One scripted status-poll step. The last step of a script repeats
/// forever, so a terminal step stays terminal and a lone pending step
/// models a job that never finishes.
#[derive(Clone)]
pub enum Scripted {
    Status(JobStatusResponse),
    /// The status query itself fails (transport outage).
    Transport,
}

pub fn pending(status: &str) -> Scripted {
    Scripted::Status(JobStatusResponse {
        status: status.to_string(),
        result: None,
        error: None,
    })
}

pub fn done(url: &str) -> Scripted {
    Scripted::Status(JobStatusResponse {
        status: "done".to_string(),
        result: Some(JobResult {
            images: vec![url.to_string()],
        }),
        error: None,
    })
}

pub fn failed(message: &str) -> Scripted {
    Scripted::Status(JobStatusResponse {
        status: "error".to_string(),
        result: None,
        error: Some(JobError {
            message: message.to_string(),
        }),
    })
}

pub fn transport() -> Scripted {
    Scripted::Transport
}

// ---------------------------------------------------------------------------
// Fake metered backend
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeBackendInner {
    next_job: usize,
    reject_prompts: HashSet<String>,
    /// Per-prompt scripts; each submission of that prompt consumes one.
    scripts_by_prompt: HashMap<String, VecDeque<Vec<Scripted>>>,
    job_scripts: HashMap<String, VecDeque<Scripted>>,
    submitted: Vec<SubmitJobRequest>,
}

/// Scripted stand-in for the metered job backend.
///
/// Scripts are keyed by prompt so concurrent batch submissions stay
/// deterministic regardless of submission order.
#[derive(Default)]
pub struct FakeBackend {
    inner: Mutex<FakeBackendInner>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every submission of `prompt` is refused by the backend.
    pub fn reject_prompt(&self, prompt: &str) {
        self.inner
            .lock()
            .unwrap()
            .reject_prompts
            .insert(prompt.to_string());
    }

    /// Queue the status script for the next submission of `prompt`.
    pub fn script(&self, prompt: &str, steps: Vec<Scripted>) {
        self.inner
            .lock()
            .unwrap()
            .scripts_by_prompt
            .entry(prompt.to_string())
            .or_default()
            .push_back(steps);
    }

    /// All submission payloads the backend has seen.
    pub fn submissions(&self) -> Vec<SubmitJobRequest> {
        self.inner.lock().unwrap().submitted.clone()
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn submit(&self, request: &SubmitJobRequest) -> Result<SubmitOutcome, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.submitted.push(request.clone());

        let prompt = request.input.prompt.clone();
        if inner.reject_prompts.contains(&prompt) {
            return Ok(SubmitOutcome::Rejected {
                message: "no capacity".to_string(),
            });
        }

        inner.next_job += 1;
        let job_id = format!("job-{}", inner.next_job);
        let steps = inner
            .scripts_by_prompt
            .get_mut(&prompt)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| vec![done("https://cdn.example/default.png")]);
        inner.job_scripts.insert(job_id.clone(), steps.into());

        Ok(SubmitOutcome::Accepted { job_id })
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, BackendError> {
        let step = {
            let mut inner = self.inner.lock().unwrap();
            match inner.job_scripts.get_mut(job_id) {
                // The last step repeats forever.
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) => queue.front().cloned().expect("script must not be empty"),
                None => {
                    return Ok(JobStatusResponse {
                        status: "queued".to_string(),
                        result: None,
                        error: None,
                    })
                }
            }
        };
        match step {
            Scripted::Status(response) => Ok(response),
            Scripted::Transport => Err(BackendError::Api {
                status: 503,
                body: "scripted outage".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Fake direct provider
// ---------------------------------------------------------------------------

/// Scripted stand-in for the personal-key provider.
#[derive(Default)]
pub struct FakeProvider {
    results: Mutex<VecDeque<Result<Option<String>, DirectProviderError>>>,
    calls: Mutex<Vec<DirectRequest>>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, result: Result<Option<String>, DirectProviderError>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<DirectRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DirectProvider for FakeProvider {
    async fn generate(
        &self,
        request: &DirectRequest,
    ) -> Result<Option<String>, DirectProviderError> {
        self.calls.lock().unwrap().push(request.clone());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Some("https://cdn.example/direct.png".to_string())))
    }
}

// ---------------------------------------------------------------------------
// Fake uploader
// ---------------------------------------------------------------------------

pub struct FakeUploader {
    fail: bool,
    counter: Mutex<usize>,
}

impl FakeUploader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            counter: Mutex::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            counter: Mutex::new(0),
        })
    }
}

#[async_trait]
impl AssetUploader for FakeUploader {
    async fn upload(&self, _bytes: Vec<u8>, _mime: &str) -> Result<StoredAsset, UploadError> {
        if self.fail {
            return Err(UploadError::Api {
                status: 500,
                body: "scripted failure".to_string(),
            });
        }
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        Ok(StoredAsset {
            url: format!("https://cdn.example/ref-{}.png", counter),
            media_id: Some(format!("media-{}", counter)),
        })
    }
}

// ---------------------------------------------------------------------------
// Recording ledger
// ---------------------------------------------------------------------------

/// Wraps [`InMemoryLedger`] and records every debit/credit intent so
/// tests can assert exact-once semantics.
pub struct RecordingLedger {
    inner: InMemoryLedger,
    debits: Mutex<Vec<Credits>>,
    credits: Mutex<Vec<Credits>>,
}

impl RecordingLedger {
    pub fn new(initial: Credits) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryLedger::new(initial),
            debits: Mutex::new(Vec::new()),
            credits: Mutex::new(Vec::new()),
        })
    }

    pub fn debits(&self) -> Vec<Credits> {
        self.debits.lock().unwrap().clone()
    }

    pub fn credits(&self) -> Vec<Credits> {
        self.credits.lock().unwrap().clone()
    }
}

#[async_trait]
impl CreditLedger for RecordingLedger {
    async fn debit(&self, amount: Credits) -> Result<(), CoreError> {
        self.debits.lock().unwrap().push(amount);
        self.inner.debit(amount).await
    }

    async fn credit(&self, amount: Credits) -> Result<(), CoreError> {
        self.credits.lock().unwrap().push(amount);
        self.inner.credit(amount).await
    }

    async fn balance(&self) -> Credits {
        self.inner.balance().await
    }
}

// ---------------------------------------------------------------------------
// Swappable pricing
// ---------------------------------------------------------------------------

/// Price book whose unit cost can change mid-test, to prove task cost
/// is frozen at creation.
pub struct SwappablePricing {
    unit: Mutex<Credits>,
}

impl SwappablePricing {
    pub fn new(unit: Credits) -> Arc<Self> {
        Arc::new(Self {
            unit: Mutex::new(unit),
        })
    }

    pub fn set_unit(&self, unit: Credits) {
        *self.unit.lock().unwrap() = unit;
    }
}

impl PricingResolver for SwappablePricing {
    fn unit_cost(&self, _model: &str, _resolution: &str) -> Option<Credits> {
        Some(*self.unit.lock().unwrap())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub backend: Arc<FakeBackend>,
    pub provider: Arc<FakeProvider>,
    pub uploader: Arc<FakeUploader>,
    pub ledger: Arc<RecordingLedger>,
    pub pricing: Arc<SwappablePricing>,
}

/// Polling delays shrunk so tests run in milliseconds.
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        project_id: "studio-tests".to_string(),
        pending_poll_delay: Duration::from_millis(1),
        transport_retry_delay: Duration::from_millis(1),
        max_poll_duration: Some(Duration::from_secs(5)),
        max_references: 4,
    }
}

pub fn harness() -> Harness {
    harness_with_config(fast_config())
}

pub fn harness_with_config(config: OrchestratorConfig) -> Harness {
    harness_with(config, FakeUploader::new())
}

pub fn harness_with_uploader(uploader: Arc<FakeUploader>) -> Harness {
    harness_with(fast_config(), uploader)
}

static TRACING: Once = Once::new();

/// Route tracing output through the test writer so `--nocapture` shows
/// the orchestrator's own logs.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn harness_with(config: OrchestratorConfig, uploader: Arc<FakeUploader>) -> Harness {
    init_tracing();
    let backend = FakeBackend::new();
    let provider = FakeProvider::new();
    let ledger = RecordingLedger::new(INITIAL_BALANCE);
    let pricing = SwappablePricing::new(UNIT_COST);

    let orchestrator = Orchestrator::new(
        backend.clone(),
        provider.clone(),
        uploader.clone(),
        ledger.clone(),
        pricing.clone(),
        Arc::new(EventBus::default()),
        config,
    );

    Harness {
        orchestrator,
        backend,
        provider,
        uploader,
        ledger,
        pricing,
    }
}

// ---------------------------------------------------------------------------
// Request builders
// ---------------------------------------------------------------------------

pub fn image_config() -> GenerationConfig {
    GenerationConfig {
        model: "aurora-v2".to_string(),
        provider: "lumen".to_string(),
        ..Default::default()
    }
}

pub fn single(prompt: &str, quantity: u32, channel: PaymentChannel) -> GenerateRequest {
    GenerateRequest {
        plan: PromptPlan::Single {
            prompt: prompt.to_string(),
            quantity,
        },
        config: image_config(),
        channel,
    }
}

pub fn batch(prompts: &[&str], channel: PaymentChannel) -> GenerateRequest {
    GenerateRequest {
        plan: PromptPlan::Batch {
            prompts: prompts.iter().map(|p| p.to_string()).collect(),
        },
        config: image_config(),
        channel,
    }
}

// ---------------------------------------------------------------------------
// Waiting
// ---------------------------------------------------------------------------

/// Poll the registry until `predicate` holds for the task, panicking
/// after five seconds.
pub async fn wait_for<F>(orchestrator: &Orchestrator, task_id: TaskId, predicate: F) -> GenerationTask
where
    F: Fn(&GenerationTask) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(task) = orchestrator.task(task_id).await {
            if predicate(&task) {
                return task;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for task {task_id}"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Wait until the task leaves `Processing`.
pub async fn wait_for_terminal(orchestrator: &Orchestrator, task_id: TaskId) -> GenerationTask {
    wait_for(orchestrator, task_id, |task| {
        task.status != TaskStatus::Processing
    })
    .await
}
