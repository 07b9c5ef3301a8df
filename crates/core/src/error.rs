//! Domain error type shared across the workspace.

use crate::types::Credits;

/// Domain-level errors produced by core logic and its consumers.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An entity lookup failed.
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Entity kind, e.g. `"task"`.
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// A validation rule was violated.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The credit balance cannot cover a pending generate action.
    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits {
        required: Credits,
        available: Credits,
    },

    /// An unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}
