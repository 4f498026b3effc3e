//! Leader election over the shared store.
//!
//! There is no quorum and no fencing: the tab that wrote the activity record
//! last is the leader. Yielding is driven by broadcast `activity_update`
//! messages; the store read is the fallback for tabs that missed them.

use std::sync::Arc;
use std::time::Duration;

use crate::identity::TabIdentity;
use crate::store::{ActivityRecord, SharedStore};

/// Leadership verdicts and activity claims for one tab.
pub trait ElectionState: Send {
    fn identity(&self) -> &TabIdentity;

    /// Whether this tab may play audio right now.
    fn is_leader(&self) -> bool;

    /// Whether the shared record names this tab, regardless of timestamps.
    fn is_recorded_leader(&self) -> bool;

    /// Whether any tab has ever claimed leadership.
    fn has_recorded_leader(&self) -> bool;

    /// Latest activity timestamp this tab knows of, its own or observed.
    fn last_active(&self) -> i64;

    /// Claim leadership. Returns the timestamp written to the record.
    fn assert_activity(&mut self, now: i64) -> i64;

    /// Take note of a sibling's reported activity. Returns `true` when the
    /// report is strictly newer than anything seen so far.
    fn observe_activity(&mut self, timestamp: i64, from: &TabIdentity) -> bool;

    /// Periodic maintenance. Returns the claimed timestamp if this tab took
    /// over leadership during the refresh.
    fn refresh(&mut self, now: i64, foreground: bool) -> Option<i64>;
}

/// Last-writer-wins election on the shared [`ActivityRecord`].
pub struct LastWriterWins {
    identity: TabIdentity,
    store: Arc<dyn SharedStore>,
    last_active: i64,
    stale_after_ms: Option<i64>,
}

impl LastWriterWins {
    pub fn new(identity: TabIdentity, store: Arc<dyn SharedStore>) -> Self {
        Self {
            identity,
            store,
            last_active: 0,
            stale_after_ms: None,
        }
    }

    /// Treat a record older than `after` as abandoned.
    pub fn with_stale_after(mut self, after: Option<Duration>) -> Self {
        self.stale_after_ms = after.map(|d| d.as_millis() as i64);
        self
    }

    fn load(&self) -> Option<ActivityRecord> {
        match ActivityRecord::load(self.store.as_ref()) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(tab = %self.identity, "Failed to read activity record: {e}");
                None
            }
        }
    }

    fn save(&self, timestamp: i64) {
        let record = ActivityRecord::new(timestamp, self.identity.clone());
        if let Err(e) = record.save(self.store.as_ref()) {
            tracing::warn!(tab = %self.identity, "Failed to write activity record: {e}");
        }
    }

    fn names_me(&self, record: &ActivityRecord) -> bool {
        record.leader.as_ref() == Some(&self.identity)
    }

    /// Refresh the record's timestamp so a live leader does not look
    /// abandoned. The record is read again right before the write and left
    /// alone if another tab has claimed it since `seen` was read. A claim
    /// landing between that second read and the write is still overwritten;
    /// the store has no compare-and-swap to close that window.
    fn heartbeat(&mut self, now: i64, seen: i64) {
        let timestamp = now.max(self.last_active);
        if timestamp <= seen {
            return;
        }
        match self.load() {
            Some(current) if self.names_me(&current) => {
                self.last_active = timestamp;
                self.save(timestamp);
            }
            Some(current) => {
                tracing::debug!(
                    tab = %self.identity,
                    leader = ?current.leader,
                    "Record claimed during heartbeat, not refreshing"
                );
            }
            None => {}
        }
    }
}

impl ElectionState for LastWriterWins {
    fn identity(&self) -> &TabIdentity {
        &self.identity
    }

    fn is_leader(&self) -> bool {
        match self.load() {
            Some(record) => {
                self.last_active >= record.last_active_timestamp && self.names_me(&record)
            }
            // Store unreachable: fall back to playing locally.
            None => true,
        }
    }

    fn is_recorded_leader(&self) -> bool {
        self.load().is_none_or(|record| self.names_me(&record))
    }

    fn has_recorded_leader(&self) -> bool {
        self.load().is_some_and(|record| record.leader.is_some())
    }

    fn last_active(&self) -> i64 {
        self.last_active
    }

    fn assert_activity(&mut self, now: i64) -> i64 {
        let stored = self.load().map_or(0, |r| r.last_active_timestamp);
        // Strictly newer than the current record so the previous leader yields.
        let timestamp = now.max(self.last_active).max(stored.saturating_add(1));
        self.last_active = timestamp;
        self.save(timestamp);
        tracing::info!(tab = %self.identity, timestamp, "Claimed leadership");
        timestamp
    }

    fn observe_activity(&mut self, timestamp: i64, from: &TabIdentity) -> bool {
        if *from == self.identity || timestamp <= self.last_active {
            return false;
        }
        self.last_active = timestamp;
        tracing::debug!(tab = %self.identity, from = %from, timestamp, "Observed newer activity");
        true
    }

    fn refresh(&mut self, now: i64, foreground: bool) -> Option<i64> {
        let stale_after = self.stale_after_ms?;
        let record = self.load()?;

        if self.names_me(&record) {
            self.heartbeat(now, record.last_active_timestamp);
            return None;
        }

        let age = now.saturating_sub(record.last_active_timestamp);
        if foreground && age > stale_after {
            tracing::info!(
                tab = %self.identity,
                stale_leader = ?record.leader,
                age_ms = age,
                "Leader record is stale, taking over"
            );
            return Some(self.assert_activity(now));
        }
        None
    }
}

/// Degraded election used when no shared store exists: this tab always leads.
///
/// Every open tab in this mode plays audio on its own.
pub struct Standalone {
    identity: TabIdentity,
    last_active: i64,
}

impl Standalone {
    pub fn new(identity: TabIdentity) -> Self {
        tracing::warn!(
            tab = %identity,
            "No shared store available, tab runs standalone and always leads"
        );
        Self {
            identity,
            last_active: 0,
        }
    }
}

impl ElectionState for Standalone {
    fn identity(&self) -> &TabIdentity {
        &self.identity
    }

    fn is_leader(&self) -> bool {
        true
    }

    fn is_recorded_leader(&self) -> bool {
        true
    }

    fn has_recorded_leader(&self) -> bool {
        true
    }

    fn last_active(&self) -> i64 {
        self.last_active
    }

    fn assert_activity(&mut self, now: i64) -> i64 {
        self.last_active = self.last_active.max(now);
        self.last_active
    }

    fn observe_activity(&mut self, _timestamp: i64, _from: &TabIdentity) -> bool {
        false
    }

    fn refresh(&mut self, _now: i64, _foreground: bool) -> Option<i64> {
        None
    }
}
