//! Broadcast capability between sibling tabs.
//!
//! Delivery is fire-and-forget: at most once, in no guaranteed order, and
//! never to tabs that are closed or not yet listening. Nothing here retains
//! history or acknowledges receipt.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::identity::TabIdentity;
use crate::message::Envelope;
use crate::{Result, TabSyncError};

/// Posts envelopes to every other tab on the bus.
pub trait Broadcast: Send + Sync {
    fn post(&self, envelope: &Envelope) -> Result<()>;
}

/// Bus that delivers nothing. Used when no broadcast medium exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBus;

impl Broadcast for NullBus {
    fn post(&self, envelope: &Envelope) -> Result<()> {
        tracing::trace!(kind = envelope.message.kind(), "NullBus dropped message");
        Ok(())
    }
}

/// In-process bus with one inbox per joined tab.
///
/// Envelopes queue up in each receiver's inbox until the test or host drains
/// them, which makes loss and reordering explicit: drop an inbox with
/// [`SimulatedBus::discard`], or reorder what [`SimulatedBus::drain`] returns
/// before delivering it.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    inboxes: Arc<Mutex<HashMap<TabIdentity, Vec<Envelope>>>>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start receiving messages for `tab`. Earlier messages are not replayed.
    pub fn join(&self, tab: &TabIdentity) -> Result<()> {
        self.lock()?.entry(tab.clone()).or_default();
        Ok(())
    }

    /// Stop receiving messages for `tab`, losing anything still pending.
    pub fn leave(&self, tab: &TabIdentity) -> Result<()> {
        self.lock()?.remove(tab);
        Ok(())
    }

    /// Take every pending envelope for `tab`, oldest first.
    pub fn drain(&self, tab: &TabIdentity) -> Result<Vec<Envelope>> {
        Ok(self
            .lock()?
            .get_mut(tab)
            .map(std::mem::take)
            .unwrap_or_default())
    }

    /// Lose every pending envelope for `tab`. Returns how many were dropped.
    pub fn discard(&self, tab: &TabIdentity) -> Result<usize> {
        Ok(self.drain(tab)?.len())
    }

    pub fn pending(&self, tab: &TabIdentity) -> Result<usize> {
        Ok(self.lock()?.get(tab).map_or(0, Vec::len))
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<TabIdentity, Vec<Envelope>>>> {
        self.inboxes
            .lock()
            .map_err(|_| TabSyncError::Broadcast("simulated bus lock poisoned".into()))
    }
}

impl Broadcast for SimulatedBus {
    fn post(&self, envelope: &Envelope) -> Result<()> {
        let mut inboxes = self.lock()?;
        for (tab, inbox) in inboxes.iter_mut() {
            if *tab != envelope.origin {
                inbox.push(envelope.clone());
            }
        }
        Ok(())
    }
}
