//! In-process broadcast bus between tab workers.

use tab_sync::{Broadcast, Envelope};
use tokio::sync::broadcast;

/// A [`Broadcast`] over a tokio broadcast channel. Every tab holds its own
/// receiver and drops envelopes it posted itself.
#[derive(Clone)]
pub struct TokioBus {
    tx: broadcast::Sender<Envelope>,
}

impl TokioBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe before the tab announces itself so nothing posted after
    /// that point is missed.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }
}

impl Broadcast for TokioBus {
    fn post(&self, envelope: &Envelope) -> tab_sync::Result<()> {
        // At-most-once: with no listeners the message is simply gone.
        if self.tx.send(envelope.clone()).is_err() {
            tracing::trace!(kind = envelope.message.kind(), "No tabs listening");
        }
        Ok(())
    }
}
