//! One worker task per simulated tab.
//!
//! Every tab runs its [`TabCoordinator`] on its own task, fed from four
//! sources: host commands, the shared bus, its audio output, and the
//! liveness interval.

use std::sync::Arc;

use anyhow::Context;
use tab_sync::{
    AudioEvent, AudioOutput, Broadcast, EnqueueOutcome, Envelope, SharedStore, SystemClock,
    TabCoordinator, TabIdentity, TabStatus, Visibility,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::app::SharedState;
use crate::audio::ClipOutput;

const COMMAND_BUFFER: usize = 64;

/// Requests a host can make of a tab.
#[derive(Debug)]
pub enum TabCommand {
    PlaySound(String, oneshot::Sender<EnqueueOutcome>),
    Stop,
    Clear,
    SetVisibility(Visibility),
    Status(oneshot::Sender<TabStatus>),
    Close,
}

/// Cloneable handle to a running tab worker.
#[derive(Debug, Clone)]
pub struct TabHandle {
    identity: TabIdentity,
    tx: mpsc::Sender<TabCommand>,
}

impl TabHandle {
    pub fn identity(&self) -> &TabIdentity {
        &self.identity
    }

    pub async fn play_sound(
        &self,
        resource_id: impl Into<String>,
    ) -> anyhow::Result<EnqueueOutcome> {
        let (tx, rx) = oneshot::channel();
        self.send(TabCommand::PlaySound(resource_id.into(), tx)).await?;
        rx.await.context("tab closed before answering")
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(TabCommand::Stop).await
    }

    pub async fn clear(&self) -> anyhow::Result<()> {
        self.send(TabCommand::Clear).await
    }

    pub async fn focus(&self) -> anyhow::Result<()> {
        self.send(TabCommand::SetVisibility(Visibility::Foreground)).await
    }

    pub async fn blur(&self) -> anyhow::Result<()> {
        self.send(TabCommand::SetVisibility(Visibility::Background)).await
    }

    pub async fn status(&self) -> anyhow::Result<TabStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(TabCommand::Status(tx)).await?;
        rx.await.context("tab closed before answering")
    }

    pub async fn close(&self) -> anyhow::Result<()> {
        self.send(TabCommand::Close).await
    }

    async fn send(&self, cmd: TabCommand) -> anyhow::Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| anyhow::anyhow!("tab {} is closed", self.identity))
    }
}

/// Open a tab that plays clips from the configured sounds directory.
pub async fn spawn_clip_tab(
    state: &SharedState,
    visibility: Visibility,
) -> (TabHandle, JoinHandle<()>) {
    let (sounds_dir, default_clip) = {
        let config = state.config().await;
        (config.sounds_dir(state.data_dir()), config.default_clip())
    };
    let (audio_tx, audio_rx) = mpsc::unbounded_channel();
    let output = ClipOutput::new(sounds_dir, default_clip, audio_tx);
    spawn_tab(state, visibility, Box::new(output), audio_rx).await
}

/// Open a tab with the given audio output. `audio_rx` carries the output's
/// asynchronous events back to the tab.
pub async fn spawn_tab(
    state: &SharedState,
    visibility: Visibility,
    output: Box<dyn AudioOutput>,
    audio_rx: mpsc::UnboundedReceiver<AudioEvent>,
) -> (TabHandle, JoinHandle<()>) {
    let config = state.config().await.sync_config();
    let bus_rx = state.bus().subscribe();

    let store: Arc<dyn SharedStore> = Arc::new(state.db().clone());
    let bus: Arc<dyn Broadcast> = Arc::new(state.bus().clone());
    let tab = TabCoordinator::new(
        config,
        store,
        bus,
        output,
        Arc::new(SystemClock),
        visibility,
    );

    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let handle = TabHandle {
        identity: tab.identity().clone(),
        tx,
    };
    let span = tracing::info_span!("tab", id = %handle.identity);
    let worker = tokio::spawn(
        run_tab(tab, rx, bus_rx, audio_rx, state.shutdown_token()).instrument(span),
    );
    (handle, worker)
}

async fn run_tab(
    mut tab: TabCoordinator,
    mut commands: mpsc::Receiver<TabCommand>,
    mut bus_rx: broadcast::Receiver<Envelope>,
    mut audio_rx: mpsc::UnboundedReceiver<AudioEvent>,
    shutdown: CancellationToken,
) {
    let mut liveness = interval(tab.config().liveness_interval);
    liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately and open() already settled leadership.
    liveness.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            cmd = commands.recv() => match cmd {
                Some(TabCommand::Close) | None => break,
                Some(cmd) => apply(&mut tab, cmd),
            },
            msg = bus_rx.recv() => match msg {
                Ok(envelope) => {
                    if envelope.origin != *tab.identity() {
                        tab.handle_envelope(envelope);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Bus lagged, {n} messages lost");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(event) = audio_rx.recv() => tab.on_audio_event(event),
            _ = liveness.tick() => tab.tick(),
        }
    }

    tab.stop_playback();
    tracing::info!("Tab closed");
}

fn apply(tab: &mut TabCoordinator, cmd: TabCommand) {
    match cmd {
        TabCommand::PlaySound(resource_id, reply) => {
            let _ = reply.send(tab.play_sound(&resource_id));
        }
        TabCommand::Stop => {
            tab.stop_playback();
        }
        TabCommand::Clear => tab.clear_queue(),
        TabCommand::SetVisibility(visibility) => tab.set_visibility(visibility),
        TabCommand::Status(reply) => {
            let _ = reply.send(tab.status());
        }
        TabCommand::Close => {}
    }
}
