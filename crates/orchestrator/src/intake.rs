//! Reference asset intake state.
//!
//! Tracks the active reference list for the next submission plus the
//! one upload that may be in flight. While an upload runs, the studio
//! shows a local preview distinct from the final list; only a
//! successful upload appends a reference.

use tokio::sync::Mutex;

use atelier_core::error::CoreError;
use atelier_core::reference::ReferenceAsset;

#[derive(Default)]
struct IntakeState {
    references: Vec<ReferenceAsset>,
    /// Local preview URL of the upload currently in flight.
    uploading: Option<String>,
}

/// Session-local reference list with a single-upload-in-flight gate.
pub struct ReferenceIntake {
    state: Mutex<IntakeState>,
    max_references: usize,
}

impl ReferenceIntake {
    pub fn new(max_references: usize) -> Self {
        Self {
            state: Mutex::new(IntakeState::default()),
            max_references,
        }
    }

    /// Snapshot of the active reference list.
    pub async fn list(&self) -> Vec<ReferenceAsset> {
        self.state.lock().await.references.clone()
    }

    /// Local preview URL of the in-flight upload, if any.
    pub async fn uploading(&self) -> Option<String> {
        self.state.lock().await.uploading.clone()
    }

    /// Claim the upload slot before starting a transfer.
    pub async fn begin(&self, preview_url: impl Into<String>) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        if state.uploading.is_some() {
            return Err(CoreError::Validation(
                "Another reference upload is already in progress".to_string(),
            ));
        }
        if state.references.len() >= self.max_references {
            return Err(CoreError::Validation(format!(
                "At most {} reference assets are allowed",
                self.max_references
            )));
        }
        state.uploading = Some(preview_url.into());
        Ok(())
    }

    /// Record a finished upload and release the slot.
    pub async fn complete(&self, asset: ReferenceAsset) {
        let mut state = self.state.lock().await;
        state.uploading = None;
        if state.references.len() < self.max_references {
            state.references.push(asset);
        }
    }

    /// Release the slot after a failed upload; no reference is added.
    pub async fn abort(&self) {
        self.state.lock().await.uploading = None;
    }

    /// Remove a reference by position. Returns `false` when out of range.
    pub async fn remove(&self, index: usize) -> bool {
        let mut state = self.state.lock().await;
        if index < state.references.len() {
            state.references.remove(index);
            true
        } else {
            false
        }
    }

    /// Drop all references.
    pub async fn clear(&self) {
        self.state.lock().await.references.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
