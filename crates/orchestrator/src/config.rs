//! Orchestrator configuration.

use std::time::Duration;

use atelier_core::reference::MAX_REFERENCES;

/// Delay between status queries while a job is still pending.
pub const DEFAULT_PENDING_POLL_DELAY: Duration = Duration::from_secs(5);

/// Longer delay applied after a transport failure during polling.
pub const DEFAULT_TRANSPORT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Wall-clock budget before a stuck job is escalated to an error.
pub const DEFAULT_MAX_POLL_DURATION: Duration = Duration::from_secs(30 * 60);

/// Tunable parameters for the orchestrator.
///
/// All fields have defaults suitable for production polling cadence;
/// tests shrink the delays to run in milliseconds.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Project identifier stamped into every submission payload.
    pub project_id: String,
    /// Delay before re-querying a still-pending job.
    pub pending_poll_delay: Duration,
    /// Delay before re-querying after the status call itself failed.
    pub transport_retry_delay: Duration,
    /// Give up on a job that never reaches a terminal status. `None`
    /// restores unbounded patience.
    pub max_poll_duration: Option<Duration>,
    /// Maximum number of reference assets per submission.
    pub max_references: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            project_id: "default".to_string(),
            pending_poll_delay: DEFAULT_PENDING_POLL_DELAY,
            transport_retry_delay: DEFAULT_TRANSPORT_RETRY_DELAY,
            max_poll_duration: Some(DEFAULT_MAX_POLL_DURATION),
            max_references: MAX_REFERENCES,
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default |
    /// |------------------------------|---------|
    /// | `ATELIER_PROJECT_ID`         | `default` |
    /// | `ATELIER_PENDING_POLL_SECS`  | `5`     |
    /// | `ATELIER_TRANSPORT_RETRY_SECS` | `10`  |
    /// | `ATELIER_MAX_POLL_SECS`      | `1800` (0 disables the cap) |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let project_id =
            std::env::var("ATELIER_PROJECT_ID").unwrap_or_else(|_| defaults.project_id);

        let pending_poll_delay = env_secs("ATELIER_PENDING_POLL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.pending_poll_delay);

        let transport_retry_delay = env_secs("ATELIER_TRANSPORT_RETRY_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.transport_retry_delay);

        let max_poll_duration = match env_secs("ATELIER_MAX_POLL_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.max_poll_duration,
        };

        Self {
            project_id,
            pending_poll_delay,
            transport_retry_delay,
            max_poll_duration,
            max_references: defaults.max_references,
        }
    }
}

/// Read a seconds value from the environment, panicking on garbage.
fn env_secs(name: &str) -> Option<u64> {
    std::env::var(name).ok().map(|raw| {
        raw.parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid u64"))
    })
}
