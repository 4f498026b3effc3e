//! Pending playback requests and their replication between tabs.
//!
//! Replication is by snapshot: every change on the leader broadcasts the
//! whole queue, and followers replace their copy wholesale. A late or
//! reordered snapshot desynchronizes a follower until the next one arrives.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;

use crate::bus::Broadcast;
use crate::identity::TabIdentity;
use crate::message::{Envelope, SyncMessage};

/// FIFO of resource ids with no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackQueue {
    items: VecDeque<String>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, resource_id: &str) -> bool {
        self.items.iter().any(|item| item == resource_id)
    }

    /// Append unless already present. Returns whether the item was added.
    pub fn push(&mut self, resource_id: &str) -> bool {
        if self.contains(resource_id) {
            return false;
        }
        self.items.push_back(resource_id.to_string());
        true
    }

    pub fn dequeue_head(&mut self) -> Option<String> {
        self.items.pop_front()
    }

    /// Replace the contents with `snapshot`, keeping the first occurrence of
    /// any repeated id.
    pub fn replace_with(&mut self, snapshot: Vec<String>) {
        self.items.clear();
        for item in snapshot {
            self.push(&item);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Result of an enqueue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOutcome {
    Queued,
    /// Already waiting in the queue.
    Duplicate,
    /// This tab is not the leader; the request was dropped.
    NotLeader,
    /// Empty resource id.
    Rejected,
}

/// Local queue copy plus snapshot replication to siblings.
pub struct QueueReplicator {
    origin: TabIdentity,
    bus: Arc<dyn Broadcast>,
    queue: PlaybackQueue,
}

impl QueueReplicator {
    pub fn new(origin: TabIdentity, bus: Arc<dyn Broadcast>) -> Self {
        Self {
            origin,
            bus,
            queue: PlaybackQueue::new(),
        }
    }

    /// Append `resource_id` on the leader and broadcast the new snapshot.
    /// Followers drop the request without touching their copy.
    pub fn enqueue(&mut self, resource_id: &str, is_leader: bool) -> EnqueueOutcome {
        if resource_id.is_empty() {
            return EnqueueOutcome::Rejected;
        }
        if self.queue.contains(resource_id) {
            tracing::debug!(resource = resource_id, "Already queued");
            return EnqueueOutcome::Duplicate;
        }
        if !is_leader {
            tracing::debug!(tab = %self.origin, resource = resource_id, "Not leader, dropping enqueue");
            return EnqueueOutcome::NotLeader;
        }

        self.queue.push(resource_id);
        tracing::info!(tab = %self.origin, resource = resource_id, len = self.queue.len(), "Queued sound");
        self.broadcast();
        EnqueueOutcome::Queued
    }

    /// Apply a snapshot received from a sibling. The leader's queue is
    /// authoritative, so snapshots are ignored while leading. Returns whether
    /// the local copy was replaced.
    pub fn apply_snapshot(&mut self, snapshot: Vec<String>, is_leader: bool) -> bool {
        if is_leader {
            tracing::debug!(tab = %self.origin, "Leader ignores queue snapshot");
            return false;
        }
        self.queue.replace_with(snapshot);
        tracing::debug!(tab = %self.origin, len = self.queue.len(), "Queue replaced from snapshot");
        true
    }

    /// Remove the head for playback and let followers know.
    pub fn dequeue_head(&mut self) -> Option<String> {
        let head = self.queue.dequeue_head()?;
        self.broadcast();
        Some(head)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        tracing::info!(tab = %self.origin, "Queue cleared");
        self.broadcast();
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    fn broadcast(&self) {
        let envelope = Envelope::new(
            self.origin.clone(),
            SyncMessage::QueueUpdate {
                queue: self.queue.snapshot(),
            },
        );
        if let Err(e) = self.bus.post(&envelope) {
            tracing::warn!(tab = %self.origin, "Failed to broadcast queue snapshot: {e}");
        }
    }
}
