//! Engine selection and per-engine payload conventions.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Media kind
// ---------------------------------------------------------------------------

/// The kind of asset an engine produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    /// The noun used in operation-type strings (`"image"`, `"video"`, ...).
    pub fn noun(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

// ---------------------------------------------------------------------------
// Reference encoding
// ---------------------------------------------------------------------------

/// How an engine expects reference assets to appear in the submission
/// payload. Some engines resolve a bare URL themselves; others require
/// the opaque media identifier returned by the uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceMode {
    Url,
    MediaId,
}

// ---------------------------------------------------------------------------
// Operation type
// ---------------------------------------------------------------------------

/// Derive the wire operation type for a submission.
///
/// `image_to_<kind>` when reference assets are attached, `text_to_<kind>`
/// otherwise.
pub fn operation_type(media: MediaKind, has_references: bool) -> String {
    let source = if has_references { "image" } else { "text" };
    format!("{source}_to_{}", media.noun())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
