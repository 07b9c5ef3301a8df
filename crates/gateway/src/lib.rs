//! HTTP gateway to the remote generation services.
//!
//! Wraps the three external channels the orchestrator talks to:
//!
//! - the metered job backend (submission + status polling),
//! - the direct provider call used with a personal API key,
//! - the asset uploader that turns local bytes into durable references.
//!
//! Also hosts the rotating provider-key pool injected into the metered
//! client. Everything network-facing lives here; the orchestrator only
//! sees the traits.

pub mod backend;
pub mod keypool;
pub mod payload;
pub mod provider;
pub mod uploader;
