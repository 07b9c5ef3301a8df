//! Direct provider client for the personal-key channel.
//!
//! Bypasses the metered backend entirely: the user's own credential is
//! sent with the request and the call resolves to a finished asset URL
//! (the provider handles its own long-running operation internally).
//! No ledger interaction ever happens on this path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body signature the provider returns when the credential no longer
/// maps to a live account entity. Surfaced as its own error variant so
/// an outer layer can prompt re-authentication.
pub const ENTITY_NOT_FOUND_SIGNATURE: &str = "Requested entity was not found";

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Parameters for a direct generation call.
#[derive(Debug, Clone, Serialize)]
pub struct DirectRequest {
    pub prompt: String,
    /// Reference asset URLs (the direct path always uses bare URLs).
    pub images: Vec<String>,
    pub model: String,
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: String,
    pub quality: String,
    #[serde(skip)]
    pub api_key: String,
}

/// A provider invoked directly with a personal API key.
#[async_trait]
pub trait DirectProvider: Send + Sync {
    /// Run a generation. `Ok(None)` means the provider finished without
    /// producing an asset, which the caller treats as a failure.
    async fn generate(&self, request: &DirectRequest)
        -> Result<Option<String>, DirectProviderError>;
}

/// Errors from the direct provider client.
#[derive(Debug, thiserror::Error)]
pub enum DirectProviderError {
    /// The HTTP request itself failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider rejected the credential: the account entity behind
    /// the key no longer exists. Named so callers can trigger re-auth.
    #[error("Provider credential no longer valid")]
    EntityNotFound,

    /// The provider returned any other non-2xx response.
    #[error("Provider API error ({status}): {body}")]
    Api {
        status: u16,
        body: String,
    },
}

/// Classify a non-2xx provider response.
pub fn classify_provider_failure(status: u16, body: &str) -> DirectProviderError {
    if body.contains(ENTITY_NOT_FOUND_SIGNATURE) {
        DirectProviderError::EntityNotFound
    } else {
        DirectProviderError::Api {
            status,
            body: body.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DirectResponse {
    /// URL of the finished asset, absent when nothing was produced.
    url: Option<String>,
}

/// HTTP client for a direct generation provider.
pub struct HttpDirectProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDirectProvider {
    /// * `base_url` - provider base URL, e.g. `https://provider.example`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl DirectProvider for HttpDirectProvider {
    /// Sends a `POST /v1/generations` request authorized with the
    /// personal key. The provider blocks until the asset is ready.
    async fn generate(
        &self,
        request: &DirectRequest,
    ) -> Result<Option<String>, DirectProviderError> {
        let response = self
            .client
            .post(format!("{}/v1/generations", self.base_url))
            .bearer_auth(&request.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(classify_provider_failure(status.as_u16(), &body));
        }

        let parsed: DirectResponse = response.json().await?;
        Ok(parsed.url)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn entity_not_found_signature_is_classified() {
        let err = classify_provider_failure(
            404,
            r#"{"error": {"message": "Requested entity was not found."}}"#,
        );
        assert_matches!(err, DirectProviderError::EntityNotFound);
    }

    #[test]
    fn other_failures_keep_status_and_body() {
        let err = classify_provider_failure(429, "rate limited");
        assert_matches!(err, DirectProviderError::Api { status: 429, ref body } if body == "rate limited");
    }

    #[test]
    fn api_key_never_serializes_into_the_body() {
        let request = DirectRequest {
            prompt: "a fox".to_string(),
            images: vec![],
            model: "aurora-v2".to_string(),
            aspect_ratio: "1:1".to_string(),
            quality: "1k".to_string(),
            api_key: "secret-key".to_string(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("secret-key"));
    }
}
