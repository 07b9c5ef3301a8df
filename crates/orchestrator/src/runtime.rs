//! Shared context threaded through submission and polling.

use std::sync::Arc;

use atelier_core::ledger::CreditLedger;
use atelier_events::EventBus;
use atelier_gateway::backend::GenerationBackend;
use atelier_gateway::provider::DirectProvider;

use crate::config::OrchestratorConfig;
use crate::registry::TaskRegistry;
use crate::scheduler::PollScheduler;

/// Everything a task needs to advance through its lifecycle.
///
/// Cloned freely into spawned submission and polling futures.
pub(crate) struct TaskRuntime {
    pub registry: Arc<TaskRegistry>,
    pub scheduler: Arc<PollScheduler>,
    pub ledger: Arc<dyn CreditLedger>,
    pub backend: Arc<dyn GenerationBackend>,
    pub provider: Arc<dyn DirectProvider>,
    pub events: Arc<EventBus>,
    pub config: OrchestratorConfig,
}
