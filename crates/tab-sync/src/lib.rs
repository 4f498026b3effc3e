//! Cross-tab coordination of notification sounds.
//!
//! Every open tab of an origin runs one [`TabCoordinator`]. Tabs talk to each
//! other only through a [`SharedStore`] (synchronous, last-writer-wins) and a
//! [`Broadcast`] bus (fire-and-forget, at-most-once). The most recently active
//! tab is elected leader and is the only one that plays queued sounds.

pub mod activity;
pub mod bus;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod election;
pub mod identity;
pub mod message;
pub mod playback;
pub mod queue;
pub mod store;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use activity::{ActivityTracker, Visibility};
pub use bus::{Broadcast, NullBus, SimulatedBus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use coordinator::{TabCoordinator, TabStatus};
pub use election::{ElectionState, LastWriterWins, Standalone};
pub use identity::TabIdentity;
pub use message::{Envelope, SyncMessage};
pub use playback::{
    AudioError, AudioEvent, AudioOutput, EventEffect, PlaybackController, PlaybackSession,
    PlaybackState, SessionId, StartOutcome,
};
pub use queue::{EnqueueOutcome, PlaybackQueue, QueueReplicator};
pub use store::{ActivityRecord, MemoryStore, SharedStore};

/// Errors raised by the shared coordination primitives.
#[derive(Debug, thiserror::Error)]
pub enum TabSyncError {
    #[error("Shared store error: {0}")]
    Store(String),

    #[error("Broadcast error: {0}")]
    Broadcast(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(#[from] serde_json::Error),
}

/// Result type alias for tab-sync operations.
pub type Result<T> = std::result::Result<T, TabSyncError>;
