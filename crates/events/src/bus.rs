//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`StudioEvent`]s. It is
//! designed to be shared via `Arc<EventBus>` across the orchestrator and
//! whatever surface renders the task list.

use serde::Serialize;
use tokio::sync::broadcast;

use atelier_core::types::TaskId;

// ---------------------------------------------------------------------------
// StudioEvent
// ---------------------------------------------------------------------------

/// A studio-level event.
///
/// Every event is best-effort: publishing is lossy when nobody listens,
/// and a failure to deliver never affects task correctness.
#[derive(Debug, Clone, Serialize)]
pub enum StudioEvent {
    /// A task's record changed (status, log lines, asset URL).
    TaskUpdated { task_id: TaskId },

    /// A job completed; the balance display should be re-fetched.
    BalanceRefreshRequested,

    /// A job completed; the generation history should be re-synced.
    HistoryResyncRequested,

    /// The direct provider reported the credential-expiry signature;
    /// an outer layer may prompt the user to re-authenticate.
    ReauthRequired { provider: String },
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`StudioEvent`].
pub struct EventBus {
    sender: broadcast::Sender<StudioEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are
    /// dropped and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: StudioEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
