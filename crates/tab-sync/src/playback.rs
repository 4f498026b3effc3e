//! Playback controller: owns the tab's single audio output.
//!
//! ```text
//! Idle -> Loading -> Playing -> Idle     (ended)
//!         Loading -> Failed  -> Idle     (start error, item dropped)
//! ```
//!
//! Output completion is asynchronous and reported back as [`AudioEvent`]s
//! tagged with the [`SessionId`] they belong to. Events for a session that
//! is no longer current are ignored.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bus::Broadcast;
use crate::identity::TabIdentity;
use crate::message::{Envelope, SyncMessage};

/// Identifies one playback attempt within a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Failed,
}

/// The item currently owned by the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackSession {
    pub id: SessionId,
    pub resource_id: String,
    pub state: PlaybackState,
}

/// How an output responded to a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Audible immediately.
    Playing,
    /// Loading; an [`AudioEvent::Started`] or [`AudioEvent::Failed`] follows.
    Pending,
}

/// Errors raised by an audio output when starting a resource.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Resource unavailable: {0}")]
    Unavailable(String),

    #[error("Playback blocked: {0}")]
    Blocked(String),

    #[error("Output error: {0}")]
    Output(String),
}

/// Asynchronous notifications from an audio output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    Started(SessionId),
    Ended(SessionId),
    Failed(SessionId, String),
}

impl AudioEvent {
    pub fn session(&self) -> SessionId {
        match self {
            Self::Started(id) | Self::Ended(id) | Self::Failed(id, _) => *id,
        }
    }
}

/// Platform audio sink. A tab never asks it to play two items at once.
pub trait AudioOutput: Send {
    fn start(
        &mut self,
        session: SessionId,
        resource_id: &str,
    ) -> Result<StartOutcome, AudioError>;
    fn stop(&mut self, session: SessionId);
}

/// What an [`AudioEvent`] did to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventEffect {
    /// Stale or redundant event.
    Ignored,
    Started,
    /// The session is over and the controller is idle again.
    Finished(PlaybackSession),
}

pub struct PlaybackController {
    origin: TabIdentity,
    bus: Arc<dyn Broadcast>,
    output: Box<dyn AudioOutput>,
    session: Option<PlaybackSession>,
    last_failure: Option<PlaybackSession>,
    next_session: u64,
}

impl PlaybackController {
    pub fn new(
        origin: TabIdentity,
        bus: Arc<dyn Broadcast>,
        output: Box<dyn AudioOutput>,
    ) -> Self {
        Self {
            origin,
            bus,
            output,
            session: None,
            last_failure: None,
            next_session: 1,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.session.as_ref().map_or(PlaybackState::Idle, |s| s.state)
    }

    pub fn current(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Most recent session that ended in [`PlaybackState::Failed`].
    pub fn last_failure(&self) -> Option<&PlaybackSession> {
        self.last_failure.as_ref()
    }

    /// Loading or playing.
    pub fn is_busy(&self) -> bool {
        self.session.is_some()
    }

    /// Start `resource_id` on the output. On error the item is already
    /// dropped and the controller is idle.
    pub fn begin(&mut self, resource_id: String) -> Result<SessionId, AudioError> {
        let id = SessionId(self.next_session);
        self.next_session += 1;

        self.session = Some(PlaybackSession {
            id,
            resource_id: resource_id.clone(),
            state: PlaybackState::Loading,
        });
        self.publish(true);

        match self.output.start(id, &resource_id) {
            Ok(StartOutcome::Playing) => {
                self.set_state(PlaybackState::Playing);
                tracing::info!(tab = %self.origin, session = %id, resource = %resource_id, "Playback started");
                Ok(id)
            }
            Ok(StartOutcome::Pending) => {
                tracing::debug!(tab = %self.origin, session = %id, resource = %resource_id, "Loading");
                Ok(id)
            }
            Err(e) => {
                tracing::warn!(tab = %self.origin, session = %id, resource = %resource_id, "Playback failed to start: {e}");
                self.fail_current();
                Err(e)
            }
        }
    }

    pub fn handle_event(&mut self, event: AudioEvent) -> EventEffect {
        let Some((id, state)) = self.session.as_ref().map(|s| (s.id, s.state)) else {
            return EventEffect::Ignored;
        };
        if id != event.session() {
            tracing::debug!(tab = %self.origin, event = ?event, "Ignoring event for stale session");
            return EventEffect::Ignored;
        }

        match event {
            AudioEvent::Started(_) => {
                if state != PlaybackState::Loading {
                    return EventEffect::Ignored;
                }
                self.set_state(PlaybackState::Playing);
                tracing::info!(tab = %self.origin, session = %id, "Playback started");
                EventEffect::Started
            }
            AudioEvent::Ended(_) => {
                let Some(session) = self.session.take() else {
                    return EventEffect::Ignored;
                };
                tracing::info!(tab = %self.origin, session = %id, resource = %session.resource_id, "Playback ended");
                self.publish(false);
                EventEffect::Finished(session)
            }
            AudioEvent::Failed(_, reason) => {
                tracing::warn!(tab = %self.origin, session = %id, "Playback failed: {reason}");
                match self.fail_current() {
                    Some(session) => EventEffect::Finished(session),
                    None => EventEffect::Ignored,
                }
            }
        }
    }

    /// Halt the output and discard the current item. It is not re-queued.
    pub fn stop(&mut self) -> Option<PlaybackSession> {
        let session = self.session.take()?;
        self.output.stop(session.id);
        tracing::info!(tab = %self.origin, session = %session.id, resource = %session.resource_id, "Playback stopped");
        self.publish(false);
        Some(session)
    }

    /// Mark the current session failed, keep it as the last failure, and go idle.
    fn fail_current(&mut self) -> Option<PlaybackSession> {
        let mut session = self.session.take()?;
        session.state = PlaybackState::Failed;
        self.last_failure = Some(session.clone());
        self.publish(false);
        Some(session)
    }

    fn set_state(&mut self, state: PlaybackState) {
        if let Some(session) = self.session.as_mut() {
            session.state = state;
        }
    }

    fn publish(&self, is_playing: bool) {
        let envelope = Envelope::new(
            self.origin.clone(),
            SyncMessage::PlaybackUpdate {
                is_playing,
                tab_identity: self.origin.clone(),
            },
        );
        if let Err(e) = self.bus.post(&envelope) {
            tracing::warn!(tab = %self.origin, "Failed to broadcast playback status: {e}");
        }
    }
}
