//! Generation configuration snapshot and defaults.
//!
//! A [`GenerationConfig`] is bound into each task at creation time and
//! never changes afterwards; later edits to the user's model or
//! resolution selection must not alter an existing task (that is what
//! keeps refunds exact).

use serde::{Deserialize, Serialize};

use crate::engine::{MediaKind, ReferenceMode};
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default output width in pixels.
pub const DEFAULT_WIDTH: u32 = 1024;
/// Default output height in pixels.
pub const DEFAULT_HEIGHT: u32 = 1024;
/// Default aspect ratio selector.
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";
/// Default resolution tier used for pricing lookups.
pub const DEFAULT_RESOLUTION: &str = "1k";

// ---------------------------------------------------------------------------
// Config snapshot
// ---------------------------------------------------------------------------

/// The generation configuration captured when a task is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Engine model key, e.g. `"aurora-v2"`. Empty means no selection.
    pub model: String,
    /// Engine provider key, e.g. `"lumen"`.
    pub provider: String,
    /// What kind of asset this engine produces.
    pub media: MediaKind,
    /// How this engine expects reference assets to be encoded.
    pub reference_mode: ReferenceMode,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: String,
    /// Resolution tier label keyed into the pricing catalog.
    pub resolution: String,
    pub seed: i64,
    pub style: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            provider: String::new(),
            media: MediaKind::Image,
            reference_mode: ReferenceMode::Url,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            resolution: DEFAULT_RESOLUTION.to_string(),
            seed: random_seed(),
            style: None,
        }
    }
}

impl GenerationConfig {
    /// Whether a model has been selected at all.
    pub fn has_model(&self) -> bool {
        !self.model.trim().is_empty()
    }
}

/// Draw a non-negative random seed for a new configuration.
pub fn random_seed() -> i64 {
    use rand::Rng;
    rand::rng().random_range(0..i64::MAX)
}

/// Validate the pre-flight requirements on a configuration.
///
/// A task is never created from an invalid configuration; this is a
/// disabling condition surfaced before submission is attempted.
pub fn validate_config(config: &GenerationConfig) -> Result<(), CoreError> {
    if !config.has_model() {
        return Err(CoreError::Validation(
            "A model must be selected before generating".to_string(),
        ));
    }
    if config.width == 0 || config.height == 0 {
        return Err(CoreError::Validation(
            "Output dimensions must be non-zero".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
