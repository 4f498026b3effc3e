//! Multi-tab simulation harness.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::{
    AudioError, AudioOutput, Envelope, ManualClock, MemoryStore, SessionId, SimulatedBus,
    StartOutcome, SyncConfig, TabCoordinator, TabIdentity, Visibility,
};

mod election;

const START_MILLIS: i64 = 1_700_000_000_000;

#[derive(Default)]
struct ProbeState {
    attempts: Vec<(SessionId, String)>,
    stopped: Vec<SessionId>,
    failing: HashSet<String>,
    pending: bool,
}

/// Audio output that records what it was asked to do.
#[derive(Clone, Default)]
pub(crate) struct OutputProbe(Arc<Mutex<ProbeState>>);

impl OutputProbe {
    pub(crate) fn attempts(&self) -> Vec<String> {
        let state = self.0.lock().unwrap();
        state.attempts.iter().map(|(_, r)| r.clone()).collect()
    }

    pub(crate) fn last_session(&self) -> SessionId {
        let state = self.0.lock().unwrap();
        state.attempts.last().expect("no playback attempted").0
    }

    pub(crate) fn stopped(&self) -> Vec<SessionId> {
        self.0.lock().unwrap().stopped.clone()
    }

    pub(crate) fn fail_on(&self, resource_id: &str) {
        self.0.lock().unwrap().failing.insert(resource_id.to_string());
    }

    /// Report `Pending` from `start`, as a loading browser element would.
    pub(crate) fn set_pending(&self, pending: bool) {
        self.0.lock().unwrap().pending = pending;
    }
}

impl AudioOutput for OutputProbe {
    fn start(
        &mut self,
        session: SessionId,
        resource_id: &str,
    ) -> Result<StartOutcome, AudioError> {
        let mut state = self.0.lock().unwrap();
        state.attempts.push((session, resource_id.to_string()));
        if state.failing.contains(resource_id) {
            return Err(AudioError::Unavailable(resource_id.to_string()));
        }
        if state.pending {
            Ok(StartOutcome::Pending)
        } else {
            Ok(StartOutcome::Playing)
        }
    }

    fn stop(&mut self, session: SessionId) {
        self.0.lock().unwrap().stopped.push(session);
    }
}

pub(crate) struct SimTab {
    pub tab: TabCoordinator,
    pub output: OutputProbe,
}

/// Several tabs sharing one store, one bus and one clock.
pub(crate) struct Harness {
    pub bus: SimulatedBus,
    pub store: MemoryStore,
    pub clock: ManualClock,
    pub tabs: Vec<SimTab>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self {
            bus: SimulatedBus::new(),
            store: MemoryStore::new(),
            clock: ManualClock::new(START_MILLIS),
            tabs: Vec::new(),
        }
    }

    pub(crate) fn open(&mut self, name: &str, visibility: Visibility) -> usize {
        self.open_with(name, visibility, SyncConfig::default())
    }

    pub(crate) fn open_with(
        &mut self,
        name: &str,
        visibility: Visibility,
        config: SyncConfig,
    ) -> usize {
        let identity = TabIdentity::from(name);
        self.bus.join(&identity).unwrap();
        let output = OutputProbe::default();
        let tab = TabCoordinator::with_identity(
            identity,
            config,
            Arc::new(self.store.clone()),
            Arc::new(self.bus.clone()),
            Box::new(output.clone()),
            Arc::new(self.clock.clone()),
            visibility,
        );
        self.tabs.push(SimTab { tab, output });
        self.tabs.len() - 1
    }

    pub(crate) fn tab(&mut self, index: usize) -> &mut TabCoordinator {
        &mut self.tabs[index].tab
    }

    pub(crate) fn output(&self, index: usize) -> &OutputProbe {
        &self.tabs[index].output
    }

    pub(crate) fn take_inbox(&self, index: usize) -> Vec<Envelope> {
        let identity = self.tabs[index].tab.identity().clone();
        self.bus.drain(&identity).unwrap()
    }

    pub(crate) fn discard_inbox(&self, index: usize) -> usize {
        let identity = self.tabs[index].tab.identity().clone();
        self.bus.discard(&identity).unwrap()
    }

    pub(crate) fn deliver(&mut self, index: usize, envelopes: Vec<Envelope>) {
        for envelope in envelopes {
            self.tabs[index].tab.handle_envelope(envelope);
        }
    }

    /// Deliver pending messages in send order until every inbox is empty.
    pub(crate) fn settle(&mut self) {
        for _ in 0..32 {
            let mut delivered = 0;
            for index in 0..self.tabs.len() {
                let inbox = self.take_inbox(index);
                delivered += inbox.len();
                self.deliver(index, inbox);
            }
            if delivered == 0 {
                return;
            }
        }
        panic!("bus did not settle");
    }
}
