//! Foreground/background tracking for one tab.

use serde::{Deserialize, Serialize};

/// Whether the tab is currently in front of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Foreground,
    Background,
}

impl Visibility {
    pub fn is_foreground(self) -> bool {
        self == Self::Foreground
    }
}

/// Current visibility plus the time of the last transition.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    visibility: Visibility,
    changed_at: i64,
}

impl ActivityTracker {
    pub fn new(visibility: Visibility, now: i64) -> Self {
        Self {
            visibility,
            changed_at: now,
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_foreground(&self) -> bool {
        self.visibility.is_foreground()
    }

    pub fn changed_at(&self) -> i64 {
        self.changed_at
    }

    /// Record a transition. Repeated foreground events (focus followed by
    /// `visibilitychange`) are recorded too; each one re-asserts activity.
    pub fn record(&mut self, visibility: Visibility, now: i64) {
        self.visibility = visibility;
        self.changed_at = now;
    }
}
