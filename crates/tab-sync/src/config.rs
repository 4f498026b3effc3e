//! Coordinator tuning.

use std::time::Duration;

/// Default period of the liveness re-check.
pub const DEFAULT_LIVENESS_INTERVAL: Duration = Duration::from_secs(3);

/// Shortest liveness period accepted.
pub const MIN_LIVENESS_INTERVAL: Duration = Duration::from_millis(100);

/// Per-tab coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// How often the host should call `TabCoordinator::tick`.
    pub liveness_interval: Duration,
    /// When set, a leader record older than this is treated as abandoned and
    /// may be taken over by a foreground tab. `None` keeps the record valid
    /// until another tab gains focus.
    pub stale_leader_after: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            liveness_interval: DEFAULT_LIVENESS_INTERVAL,
            stale_leader_after: None,
        }
    }
}

impl SyncConfig {
    pub fn with_liveness_interval(mut self, interval: Duration) -> Self {
        self.liveness_interval = interval.max(MIN_LIVENESS_INTERVAL);
        self
    }

    /// Enable leader expiry. The threshold is never shorter than two
    /// liveness periods, otherwise a healthy leader could expire between
    /// heartbeats.
    pub fn with_stale_leader_after(mut self, after: Duration) -> Self {
        self.stale_leader_after = Some(after.max(self.liveness_interval * 2));
        self
    }
}
