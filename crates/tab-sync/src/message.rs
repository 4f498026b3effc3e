//! Inter-tab wire format.
//!
//! Messages travel as small JSON records tagged by `type`:
//!
//! | type              | fields                                |
//! |-------------------|---------------------------------------|
//! | `activity_update` | `timestamp`, `tabIdentity`, `isActive`|
//! | `queue_update`    | `queue`                               |
//! | `playback_update` | `isPlaying`, `tabIdentity`            |

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::identity::TabIdentity;

/// A coordination message broadcast to sibling tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncMessage {
    /// Sender moved to the foreground (`is_active`) or background.
    ActivityUpdate {
        timestamp: i64,
        #[serde(rename = "tabIdentity")]
        tab_identity: TabIdentity,
        #[serde(rename = "isActive")]
        is_active: bool,
    },
    /// Full queue snapshot from the leader.
    QueueUpdate { queue: Vec<String> },
    /// Sender started or stopped playing.
    PlaybackUpdate {
        #[serde(rename = "isPlaying")]
        is_playing: bool,
        #[serde(rename = "tabIdentity")]
        tab_identity: TabIdentity,
    },
}

impl SyncMessage {
    /// Wire name of the message type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ActivityUpdate { .. } => "activity_update",
            Self::QueueUpdate { .. } => "queue_update",
            Self::PlaybackUpdate { .. } => "playback_update",
        }
    }
}

/// A message together with the tab that posted it.
///
/// Buses use `origin` to avoid echoing a message back to its sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub origin: TabIdentity,
    pub message: SyncMessage,
}

impl Envelope {
    pub fn new(origin: TabIdentity, message: SyncMessage) -> Self {
        Self { origin, message }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
