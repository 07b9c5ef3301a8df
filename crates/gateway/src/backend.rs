//! REST client for the metered generation backend.
//!
//! Wraps the backend HTTP API (job submission and status polling) using
//! [`reqwest`]. The orchestrator depends on the [`GenerationBackend`]
//! trait so tests can script outcomes without a network.

use std::sync::Arc;

use async_trait::async_trait;

use crate::keypool::{KeyPool, KeyPoolError};
use crate::payload::{JobStatusResponse, SubmitJobRequest, SubmitJobResponse};

/// Header carrying the pooled provider key on metered calls.
const PROVIDER_KEY_HEADER: &str = "X-Provider-Key";

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Result of a submission attempt that reached the backend.
///
/// A backend-level refusal is distinct from a transport error: refusals
/// come back as `Rejected`, while transport failures surface as `Err`.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// The backend accepted the job and assigned it an id.
    Accepted { job_id: String },
    /// The backend declined the job.
    Rejected { message: String },
}

/// The metered job backend: submit a generation job, poll its status.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn submit(&self, request: &SubmitJobRequest) -> Result<SubmitOutcome, BackendError>;

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, BackendError>;
}

/// Errors from the metered backend client.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// No provider key could be acquired for the call.
    #[error("Provider key unavailable: {0}")]
    KeyPool(#[from] KeyPoolError),
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// HTTP client for the metered backend.
pub struct MeteredApi {
    client: reqwest::Client,
    base_url: String,
    keys: Arc<KeyPool>,
}

impl MeteredApi {
    /// Create a new client.
    ///
    /// * `base_url` - backend base URL, e.g. `https://api.example.com`.
    /// * `keys`     - provider key pool attached to every call.
    pub fn new(base_url: String, keys: Arc<KeyPool>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            keys,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across gateway components).
    pub fn with_client(client: reqwest::Client, base_url: String, keys: Arc<KeyPool>) -> Self {
        Self {
            client,
            base_url,
            keys,
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, or capture the
    /// status and body text for debugging.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl GenerationBackend for MeteredApi {
    /// Submit a generation job.
    ///
    /// Sends a `POST /api/v1/jobs` request with a pooled provider key
    /// attached. A `success: false` envelope is a backend refusal, not
    /// an error.
    async fn submit(&self, request: &SubmitJobRequest) -> Result<SubmitOutcome, BackendError> {
        let key = self.keys.acquire().await?;

        let response = self
            .client
            .post(format!("{}/api/v1/jobs", self.base_url))
            .header(PROVIDER_KEY_HEADER, key)
            .json(request)
            .send()
            .await?;

        let envelope: SubmitJobResponse = Self::parse_response(response).await?;
        match envelope {
            SubmitJobResponse {
                success: true,
                data: Some(data),
                ..
            } => Ok(SubmitOutcome::Accepted { job_id: data.job_id }),
            SubmitJobResponse { message, .. } => Ok(SubmitOutcome::Rejected {
                message: message.unwrap_or_else(|| "Submission declined".to_string()),
            }),
        }
    }

    /// Query the status of an in-flight job.
    ///
    /// Sends a `GET /api/v1/jobs/{job_id}/status` request. Transport
    /// failures bubble up as [`BackendError`]; the caller decides how
    /// patiently to retry.
    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, BackendError> {
        let response = self
            .client
            .get(format!("{}/api/v1/jobs/{}/status", self.base_url, job_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }
}
