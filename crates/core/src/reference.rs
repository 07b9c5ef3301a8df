//! Reference asset types and intake validation.
//!
//! Before a prompt can reference an uploaded image, the file is checked
//! against the allowed formats and size cap, then handed to the asset
//! uploader. Sniffing uses the image header bytes rather than trusting
//! the declared content type.

use serde::{Deserialize, Serialize};

use crate::engine::ReferenceMode;
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum number of reference assets attachable to one submission.
pub const MAX_REFERENCES: usize = 4;

/// Maximum accepted upload size in bytes (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// MIME types accepted for reference uploads.
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

// ---------------------------------------------------------------------------
// Reference asset
// ---------------------------------------------------------------------------

/// A stored reference asset attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceAsset {
    /// Durable URL returned by the uploader.
    pub url: String,
    /// Opaque media identifier, required by some engines.
    pub media_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Sniff the MIME type from the upload's header bytes.
///
/// Returns `None` for formats outside the allow list.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Png => Some("image/png"),
        image::ImageFormat::Jpeg => Some("image/jpeg"),
        image::ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

/// Validate an upload before it is handed to the asset uploader.
///
/// Checks the size cap, the declared MIME type, and that the header
/// bytes actually match an allowed format.
pub fn validate_reference_upload(bytes: &[u8], declared_mime: &str) -> Result<(), CoreError> {
    if bytes.is_empty() {
        return Err(CoreError::Validation(
            "Reference upload is empty".to_string(),
        ));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(CoreError::Validation(format!(
            "Reference upload exceeds {MAX_UPLOAD_BYTES} bytes"
        )));
    }
    if !ALLOWED_MIME_TYPES.contains(&declared_mime) {
        return Err(CoreError::Validation(format!(
            "Unsupported reference type '{declared_mime}'. Must be one of: {}",
            ALLOWED_MIME_TYPES.join(", ")
        )));
    }
    match sniff_mime(bytes) {
        Some(_) => Ok(()),
        None => Err(CoreError::Validation(
            "Reference upload does not look like a supported image".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Payload encoding
// ---------------------------------------------------------------------------

/// Encode the reference list for a submission payload.
///
/// Engines that require the opaque media id fall back to the URL when
/// an asset has none (uploads from before the engine switch).
pub fn encode_references(references: &[ReferenceAsset], mode: ReferenceMode) -> Vec<String> {
    references
        .iter()
        .map(|r| match mode {
            ReferenceMode::Url => r.url.clone(),
            ReferenceMode::MediaId => r.media_id.clone().unwrap_or_else(|| r.url.clone()),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
