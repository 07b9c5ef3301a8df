//! Wire types for the metered job backend.
//!
//! Field names follow the backend's JSON contract (camelCase where the
//! backend uses it); everything else in the workspace stays snake_case.

use serde::{Deserialize, Serialize};

use atelier_core::engine::operation_type;
use atelier_core::generation::GenerationConfig;
use atelier_core::reference::{encode_references, ReferenceAsset};

// ---------------------------------------------------------------------------
// Submission request
// ---------------------------------------------------------------------------

/// Privacy setting sent with every submission.
const PRIVACY_PRIVATE: &str = "PRIVATE";

/// A generation job submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitJobRequest {
    /// Operation type, e.g. `"text_to_image"` or `"image_to_video"`.
    #[serde(rename = "type")]
    pub operation: String,
    pub input: JobInput,
    pub config: JobConfig,
    pub engine: EngineRef,
    #[serde(rename = "enginePayload")]
    pub engine_payload: EnginePayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobInput {
    pub prompt: String,
    /// Encoded reference assets; omitted for text-to-X operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobConfig {
    pub width: u32,
    pub height: u32,
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: String,
    pub seed: i64,
    pub style: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineRef {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnginePayload {
    pub prompt: String,
    pub privacy: String,
    #[serde(rename = "projectId")]
    pub project_id: String,
    pub mode: String,
}

/// Build a submission request from a task's frozen snapshot.
///
/// The operation type is derived from the presence of references, and
/// the reference list is encoded per the engine's reference mode.
pub fn build_submit_request(
    prompt: &str,
    config: &GenerationConfig,
    references: &[ReferenceAsset],
    project_id: &str,
) -> SubmitJobRequest {
    let operation = operation_type(config.media, !references.is_empty());
    let images = if references.is_empty() {
        None
    } else {
        Some(encode_references(references, config.reference_mode))
    };

    SubmitJobRequest {
        operation: operation.clone(),
        input: JobInput {
            prompt: prompt.to_string(),
            images,
        },
        config: JobConfig {
            width: config.width,
            height: config.height,
            aspect_ratio: config.aspect_ratio.clone(),
            seed: config.seed,
            style: config.style.clone().unwrap_or_default(),
        },
        engine: EngineRef {
            provider: config.provider.clone(),
            model: config.model.clone(),
        },
        engine_payload: EnginePayload {
            prompt: prompt.to_string(),
            privacy: PRIVACY_PRIVATE.to_string(),
            project_id: project_id.to_string(),
            mode: operation,
        },
    }
}

// ---------------------------------------------------------------------------
// Submission response
// ---------------------------------------------------------------------------

/// Envelope returned by the submission endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitJobResponse {
    pub success: bool,
    pub data: Option<SubmitJobData>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitJobData {
    #[serde(rename = "jobId")]
    pub job_id: String,
}

// ---------------------------------------------------------------------------
// Status response
// ---------------------------------------------------------------------------

/// One status query result for an in-flight job.
///
/// The status string is kept raw: anything the classifier does not
/// recognize counts as still pending.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub status: String,
    pub result: Option<JobResult>,
    pub error: Option<JobError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobResult {
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobError {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Terminal classification of a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPhase {
    /// The backend reported an explicit failure.
    Failed { message: Option<String> },
    /// The job finished and produced at least one asset.
    Completed { url: String },
    /// Anything else, including unrecognized statuses.
    Pending { status: String },
}

/// Classify a status response into its three-way bucket.
///
/// A `done` status without any output asset is deliberately treated as
/// pending; the poll deadline eventually escalates it.
pub fn classify(response: &JobStatusResponse) -> JobPhase {
    match response.status.as_str() {
        "error" | "failed" => JobPhase::Failed {
            message: response.error.as_ref().map(|e| e.message.clone()),
        },
        "done" => match response
            .result
            .as_ref()
            .and_then(|r| r.images.first())
            .cloned()
        {
            Some(url) => JobPhase::Completed { url },
            None => JobPhase::Pending {
                status: response.status.clone(),
            },
        },
        other => JobPhase::Pending {
            status: other.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
