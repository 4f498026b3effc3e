//! Audio output for headless hosts: resolves a resource id to a file under
//! the sounds directory, probes its length on the blocking pool, and reports
//! the end of the clip after that much time has passed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lofty::prelude::*;
use lofty::probe::Probe;
use tab_sync::{AudioError, AudioEvent, AudioOutput, SessionId, StartOutcome};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, spawn_blocking};
use tracing::Instrument;

pub struct ClipOutput {
    sounds_dir: PathBuf,
    default_clip: Duration,
    events: mpsc::UnboundedSender<AudioEvent>,
    playing: Option<(SessionId, JoinHandle<()>)>,
}

impl ClipOutput {
    pub fn new(
        sounds_dir: PathBuf,
        default_clip: Duration,
        events: mpsc::UnboundedSender<AudioEvent>,
    ) -> Self {
        Self {
            sounds_dir,
            default_clip,
            events,
            playing: None,
        }
    }

    /// Map a resource id such as `/static/sounds/info.mp3` to a file in the
    /// sounds directory. Only the final path component is used.
    pub fn resolve(&self, resource_id: &str) -> Option<PathBuf> {
        let name = Path::new(resource_id).file_name()?;
        Some(self.sounds_dir.join(name))
    }
}

/// Clip length from the file's audio properties, or `default_clip` when the
/// container does not report one. Blocking: opens and parses the file.
fn clip_length(path: &Path, default_clip: Duration) -> Result<Duration, AudioError> {
    if !path.is_file() {
        return Err(AudioError::Unavailable(path.display().to_string()));
    }
    let tagged = Probe::open(path)
        .and_then(|p| p.guess_file_type().map_err(Into::into))
        .and_then(|p| p.read())
        .map_err(|e| AudioError::Unavailable(format!("{}: {e}", path.display())))?;

    let duration = tagged.properties().duration();
    if duration.is_zero() {
        Ok(default_clip)
    } else {
        Ok(duration)
    }
}

impl AudioOutput for ClipOutput {
    /// Returns `Pending` at once; the file is probed off the async workers
    /// and `Started` then `Ended`, or `Failed`, follow on the event channel.
    fn start(
        &mut self,
        session: SessionId,
        resource_id: &str,
    ) -> Result<StartOutcome, AudioError> {
        let path = self
            .resolve(resource_id)
            .ok_or_else(|| AudioError::Unavailable(resource_id.to_string()))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AudioError::Output(e.to_string()))?;

        let events = self.events.clone();
        let default_clip = self.default_clip;
        let clip = runtime.spawn(
            async move {
                let file = path.display().to_string();
                let probed = spawn_blocking(move || clip_length(&path, default_clip))
                    .await
                    .map_err(|e| AudioError::Output(e.to_string()))
                    .and_then(|length| length);
                let length = match probed {
                    Ok(length) => length,
                    Err(e) => {
                        let _ = events.send(AudioEvent::Failed(session, e.to_string()));
                        return;
                    }
                };

                tracing::info!(
                    session = session.get(),
                    file = %file,
                    ms = length.as_millis() as u64,
                    "Clip started"
                );
                let _ = events.send(AudioEvent::Started(session));
                tokio::time::sleep(length).await;
                let _ = events.send(AudioEvent::Ended(session));
            }
            .in_current_span(),
        );

        if let Some((_, previous)) = self.playing.replace((session, clip)) {
            previous.abort();
        }
        Ok(StartOutcome::Pending)
    }

    fn stop(&mut self, session: SessionId) {
        match self.playing.take() {
            Some((current, clip)) if current == session => {
                clip.abort();
                tracing::debug!(session = session.get(), "Clip stopped");
            }
            other => self.playing = other,
        }
    }
}
