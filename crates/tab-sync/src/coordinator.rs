//! Per-tab coordinator: activity tracking, election, queue replication and
//! playback composed behind one event-driven facade.
//!
//! The coordinator never blocks and owns no timers. The host feeds it
//! visibility changes, bus envelopes, audio events and periodic ticks.

use std::sync::Arc;

use serde::Serialize;

use crate::activity::{ActivityTracker, Visibility};
use crate::bus::{Broadcast, NullBus};
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::election::{ElectionState, LastWriterWins, Standalone};
use crate::identity::TabIdentity;
use crate::message::{Envelope, SyncMessage};
use crate::playback::{
    AudioEvent, AudioOutput, EventEffect, PlaybackController, PlaybackSession, PlaybackState,
};
use crate::queue::{EnqueueOutcome, QueueReplicator};
use crate::store::SharedStore;

/// Snapshot of a tab's coordination state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabStatus {
    pub identity: TabIdentity,
    pub visibility: Visibility,
    pub is_leader: bool,
    pub playback_state: PlaybackState,
    pub current: Option<String>,
    pub queue: Vec<String>,
    pub last_active: i64,
    pub playing_elsewhere: Option<TabIdentity>,
    /// Resource of the most recent item that failed to play.
    pub last_failure: Option<String>,
}

pub struct TabCoordinator {
    identity: TabIdentity,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    bus: Arc<dyn Broadcast>,
    election: Box<dyn ElectionState>,
    activity: ActivityTracker,
    queue: QueueReplicator,
    playback: PlaybackController,
    playing_elsewhere: Option<TabIdentity>,
}

impl TabCoordinator {
    /// Build a coordinator for a newly opened tab with a fresh identity.
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn SharedStore>,
        bus: Arc<dyn Broadcast>,
        output: Box<dyn AudioOutput>,
        clock: Arc<dyn Clock>,
        visibility: Visibility,
    ) -> Self {
        Self::with_identity(
            TabIdentity::generate(),
            config,
            store,
            bus,
            output,
            clock,
            visibility,
        )
    }

    pub fn with_identity(
        identity: TabIdentity,
        config: SyncConfig,
        store: Arc<dyn SharedStore>,
        bus: Arc<dyn Broadcast>,
        output: Box<dyn AudioOutput>,
        clock: Arc<dyn Clock>,
        visibility: Visibility,
    ) -> Self {
        let election = LastWriterWins::new(identity.clone(), store)
            .with_stale_after(config.stale_leader_after);
        Self::assemble(
            identity,
            config,
            Box::new(election),
            bus,
            output,
            clock,
            visibility,
        )
    }

    /// Degraded mode for environments without a shared store or bus: the tab
    /// always leads, so every open tab plays its own sounds.
    pub fn standalone(
        config: SyncConfig,
        output: Box<dyn AudioOutput>,
        clock: Arc<dyn Clock>,
        visibility: Visibility,
    ) -> Self {
        let identity = TabIdentity::generate();
        let election = Standalone::new(identity.clone());
        Self::assemble(
            identity,
            config,
            Box::new(election),
            Arc::new(NullBus),
            output,
            clock,
            visibility,
        )
    }

    fn assemble(
        identity: TabIdentity,
        config: SyncConfig,
        election: Box<dyn ElectionState>,
        bus: Arc<dyn Broadcast>,
        output: Box<dyn AudioOutput>,
        clock: Arc<dyn Clock>,
        visibility: Visibility,
    ) -> Self {
        let now = clock.now_millis();
        let mut tab = Self {
            queue: QueueReplicator::new(identity.clone(), bus.clone()),
            playback: PlaybackController::new(identity.clone(), bus.clone(), output),
            activity: ActivityTracker::new(visibility, now),
            identity,
            config,
            clock,
            bus,
            election,
            playing_elsewhere: None,
        };
        tab.open(visibility, now);
        tab
    }

    /// A tab opened in front claims leadership. One opened in the background
    /// only claims when no tab has ever led.
    fn open(&mut self, visibility: Visibility, now: i64) {
        tracing::info!(tab = %self.identity, ?visibility, "Tab opened");
        match visibility {
            Visibility::Foreground => self.announce_activity(now),
            Visibility::Background => {
                if !self.election.has_recorded_leader() {
                    self.election.assert_activity(now);
                }
            }
        }
    }

    /// Entry point for callers that want a sound announced.
    pub fn play_sound(&mut self, resource_id: &str) -> EnqueueOutcome {
        let outcome = self.queue.enqueue(resource_id, self.election.is_leader());
        if outcome == EnqueueOutcome::Queued {
            self.try_play_next();
        }
        outcome
    }

    /// Halt the current item, if any. The item is discarded, not re-queued.
    pub fn stop_playback(&mut self) -> Option<PlaybackSession> {
        self.playback.stop()
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        let now = self.clock.now_millis();
        self.activity.record(visibility, now);
        match visibility {
            Visibility::Foreground => self.announce_activity(now),
            Visibility::Background => {
                tracing::debug!(tab = %self.identity, "Tab moved to background");
                // A background tab keeps its leadership; only siblings are told.
                self.publish(SyncMessage::ActivityUpdate {
                    timestamp: self.election.last_active(),
                    tab_identity: self.identity.clone(),
                    is_active: false,
                });
            }
        }
    }

    /// Apply a message from a sibling tab.
    pub fn handle_envelope(&mut self, envelope: Envelope) {
        if envelope.origin == self.identity {
            return;
        }
        tracing::debug!(
            tab = %self.identity,
            from = %envelope.origin,
            kind = envelope.message.kind(),
            "Received message"
        );

        match envelope.message {
            SyncMessage::ActivityUpdate {
                timestamp,
                tab_identity,
                ..
            } => {
                let newer = self.election.observe_activity(timestamp, &tab_identity);
                if newer && tab_identity != self.identity && self.playback.is_busy() {
                    tracing::info!(tab = %self.identity, newer_tab = %tab_identity, "Lost leadership, yielding playback");
                    self.stop_playback();
                }
            }
            SyncMessage::QueueUpdate { queue } => {
                let is_leader = self.election.is_leader();
                self.queue.apply_snapshot(queue, is_leader);
            }
            SyncMessage::PlaybackUpdate {
                is_playing,
                tab_identity,
            } => {
                if is_playing {
                    if tab_identity != self.identity
                        && self.playback.is_busy()
                        && !self.election.is_leader()
                    {
                        tracing::info!(tab = %self.identity, playing_tab = %tab_identity, "Sibling is playing, yielding playback");
                        self.stop_playback();
                    }
                    self.playing_elsewhere = Some(tab_identity);
                } else if self.playing_elsewhere.as_ref() == Some(&tab_identity) {
                    self.playing_elsewhere = None;
                }
            }
        }
    }

    /// Feed an asynchronous notification from the audio output.
    pub fn on_audio_event(&mut self, event: AudioEvent) {
        if let EventEffect::Finished(_) = self.playback.handle_event(event) {
            self.try_play_next();
        }
    }

    /// Periodic liveness check, driven by the host every
    /// [`SyncConfig::liveness_interval`].
    pub fn tick(&mut self) {
        let now = self.clock.now_millis();
        let foreground = self.activity.is_foreground();

        if let Some(timestamp) = self.election.refresh(now, foreground) {
            self.publish(SyncMessage::ActivityUpdate {
                timestamp,
                tab_identity: self.identity.clone(),
                is_active: true,
            });
            self.try_play_next();
            return;
        }

        // The recorded leader may have lost focus without anyone taking over.
        if !foreground && self.election.is_recorded_leader() {
            self.try_play_next();
        }
    }

    pub fn identity(&self) -> &TabIdentity {
        &self.identity
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_leader(&self) -> bool {
        self.election.is_leader()
    }

    pub fn visibility(&self) -> Visibility {
        self.activity.visibility()
    }

    /// Loading or playing.
    pub fn is_playing(&self) -> bool {
        self.playback.is_busy()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn current(&self) -> Option<&PlaybackSession> {
        self.playback.current()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.queue().len()
    }

    pub fn queue_snapshot(&self) -> Vec<String> {
        self.queue.queue().snapshot()
    }

    pub fn playing_elsewhere(&self) -> Option<&TabIdentity> {
        self.playing_elsewhere.as_ref()
    }

    pub fn status(&self) -> TabStatus {
        TabStatus {
            identity: self.identity.clone(),
            visibility: self.activity.visibility(),
            is_leader: self.election.is_leader(),
            playback_state: self.playback.state(),
            current: self.playback.current().map(|s| s.resource_id.clone()),
            queue: self.queue_snapshot(),
            last_active: self.election.last_active(),
            playing_elsewhere: self.playing_elsewhere.clone(),
            last_failure: self.playback.last_failure().map(|s| s.resource_id.clone()),
        }
    }

    /// Play queued items one at a time while this tab leads. Items that fail
    /// to start are dropped and the next head is tried at once.
    fn try_play_next(&mut self) {
        loop {
            if self.playback.is_busy()
                || self.queue.queue().is_empty()
                || !self.election.is_leader()
            {
                return;
            }
            let Some(resource_id) = self.queue.dequeue_head() else {
                return;
            };
            if self.playback.begin(resource_id).is_ok() {
                return;
            }
        }
    }

    fn announce_activity(&mut self, now: i64) {
        let timestamp = self.election.assert_activity(now);
        self.publish(SyncMessage::ActivityUpdate {
            timestamp,
            tab_identity: self.identity.clone(),
            is_active: true,
        });
        self.try_play_next();
    }

    fn publish(&self, message: SyncMessage) {
        let envelope = Envelope::new(self.identity.clone(), message);
        if let Err(e) = self.bus.post(&envelope) {
            tracing::warn!(tab = %self.identity, "Failed to broadcast: {e}");
        }
    }
}
