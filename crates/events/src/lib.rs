//! Atelier in-process event infrastructure.
//!
//! Provides the studio-wide publish/subscribe hub:
//!
//! - [`EventBus`] -- fan-out bus backed by `tokio::sync::broadcast`.
//! - [`StudioEvent`] -- the typed events the rest of the studio cares
//!   about (task updates, refresh hints, re-auth signals).

pub mod bus;

pub use bus::{EventBus, StudioEvent};
