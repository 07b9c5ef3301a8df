//! Asset uploader client.
//!
//! Turns validated local bytes into a durable reference: a URL plus the
//! opaque media identifier some engines require.

use async_trait::async_trait;
use serde::Deserialize;

/// A stored reference asset as returned by the upload service.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredAsset {
    pub url: String,
    #[serde(rename = "mediaId")]
    pub media_id: Option<String>,
}

/// The asset upload service.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, mime: &str) -> Result<StoredAsset, UploadError>;
}

/// Errors from the uploader client.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The HTTP request itself failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The upload service returned a non-2xx status code.
    #[error("Upload service error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// HTTP multipart implementation of [`AssetUploader`].
pub struct HttpUploader {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUploader {
    /// * `base_url` - upload service base URL.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl AssetUploader for HttpUploader {
    /// Sends a `POST /api/v1/media` multipart request with the file part.
    async fn upload(&self, bytes: Vec<u8>, mime: &str) -> Result<StoredAsset, UploadError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("reference")
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/api/v1/media", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(UploadError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<StoredAsset>().await?)
    }
}
