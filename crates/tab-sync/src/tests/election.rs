use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Harness, OutputProbe};
use crate::store::{LAST_ACTIVE_TAB_KEY, LAST_ACTIVE_TIMESTAMP_KEY};
use crate::{
    ActivityRecord, Clock, ElectionState, LastWriterWins, ManualClock, MemoryStore, PlaybackState,
    Result, SharedStore, Standalone, SyncConfig, TabCoordinator, TabIdentity, TabSyncError,
    Visibility,
};

struct UnavailableStore;

impl SharedStore for UnavailableStore {
    fn read(&self, _key: &str) -> Result<Option<String>> {
        Err(TabSyncError::Store("storage disabled".into()))
    }

    fn write(&self, _key: &str, _value: &str) -> Result<()> {
        Err(TabSyncError::Store("storage disabled".into()))
    }
}

/// Store that writes a sibling's claim once a given number of reads have
/// gone through, as if that tab gained focus mid-operation.
struct ClaimAfterReads {
    inner: MemoryStore,
    pending: Mutex<Option<(usize, ActivityRecord)>>,
}

impl ClaimAfterReads {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            pending: Mutex::new(None),
        }
    }

    fn claim_after(&self, reads: usize, claim: ActivityRecord) {
        *self.pending.lock().unwrap() = Some((reads, claim));
    }
}

impl SharedStore for ClaimAfterReads {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let mut pending = self.pending.lock().unwrap();
        match pending.take() {
            Some((0, claim)) => claim.save(&self.inner)?,
            Some((n, claim)) => *pending = Some((n - 1, claim)),
            None => {}
        }
        drop(pending);
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.inner.write(key, value)
    }
}

fn record(h: &Harness) -> ActivityRecord {
    ActivityRecord::load(&h.store).unwrap()
}

#[test]
fn test_foreground_tab_claims_on_open() {
    let mut h = Harness::new();
    let a = h.open("a", Visibility::Foreground);

    assert!(h.tab(a).is_leader());
    let rec = record(&h);
    assert_eq!(rec.leader, Some(TabIdentity::from("a")));
    assert_eq!(rec.last_active_timestamp, h.tab(a).status().last_active);
}

#[test]
fn test_background_tab_does_not_displace_leader_on_open() {
    let mut h = Harness::new();
    let a = h.open("a", Visibility::Foreground);
    let b = h.open("b", Visibility::Background);

    assert!(h.tab(a).is_leader());
    assert!(!h.tab(b).is_leader());
    assert_eq!(record(&h).leader, Some(TabIdentity::from("a")));
}

#[test]
fn test_background_tab_claims_when_nobody_leads() {
    let mut h = Harness::new();
    let b = h.open("b", Visibility::Background);
    assert!(h.tab(b).is_leader());
}

#[test]
fn test_latest_focus_wins() {
    let mut h = Harness::new();
    let a = h.open("a", Visibility::Foreground);
    let b = h.open("b", Visibility::Background);
    h.settle();

    h.clock.advance(Duration::from_secs(5));
    h.tab(b).set_visibility(Visibility::Foreground);
    h.settle();

    assert!(h.tab(b).is_leader());
    assert!(!h.tab(a).is_leader());
    assert_eq!(record(&h).leader, Some(TabIdentity::from("b")));
}

#[test]
fn test_claims_at_same_instant_are_strictly_ordered() {
    let mut h = Harness::new();
    let a = h.open("a", Visibility::Foreground);
    let b = h.open("b", Visibility::Background);

    // Clock does not move between the two focus events.
    h.tab(b).set_visibility(Visibility::Foreground);
    let a_ts = h.tab(a).status().last_active;
    let b_ts = h.tab(b).status().last_active;
    assert!(b_ts > a_ts);
    assert_eq!(record(&h).last_active_timestamp, b_ts);
}

#[test]
fn test_background_transition_keeps_leadership() {
    let mut h = Harness::new();
    let a = h.open("a", Visibility::Foreground);
    let b = h.open("b", Visibility::Background);
    h.settle();

    h.clock.advance(Duration::from_secs(1));
    h.tab(a).set_visibility(Visibility::Background);
    h.settle();

    assert!(h.tab(a).is_leader());
    assert!(!h.tab(b).is_leader());
}

#[test]
fn test_observing_activity_does_not_write_record() {
    let store = MemoryStore::new();
    ActivityRecord::new(100, TabIdentity::from("a"))
        .save(&store)
        .unwrap();

    let mut election = LastWriterWins::new(TabIdentity::from("b"), Arc::new(store.clone()));
    assert!(election.observe_activity(500, &TabIdentity::from("c")));
    assert!(!election.observe_activity(400, &TabIdentity::from("c")));
    assert_eq!(election.last_active(), 500);

    assert_eq!(store.read(LAST_ACTIVE_TIMESTAMP_KEY).unwrap(), Some("100".into()));
    assert_eq!(store.read(LAST_ACTIVE_TAB_KEY).unwrap(), Some("a".into()));
}

#[test]
fn test_own_activity_reports_are_not_observed() {
    let mut election =
        LastWriterWins::new(TabIdentity::from("a"), Arc::new(MemoryStore::new()));
    assert!(!election.observe_activity(900, &TabIdentity::from("a")));
    assert_eq!(election.last_active(), 0);
}

#[test]
fn test_record_timestamp_never_decreases() {
    let store = MemoryStore::new();
    ActivityRecord::new(10_000, TabIdentity::from("a"))
        .save(&store)
        .unwrap();

    // A tab whose clock lags behind the stored claim.
    let mut election = LastWriterWins::new(TabIdentity::from("b"), Arc::new(store.clone()));
    let ts = election.assert_activity(5_000);

    assert_eq!(ts, 10_001);
    assert!(election.is_leader());
    assert_eq!(ActivityRecord::load(&store).unwrap().last_active_timestamp, 10_001);
}

#[test]
fn test_unavailable_store_degrades_to_leader() {
    let clock = ManualClock::new(1_000);
    let output = OutputProbe::default();
    let mut tab = TabCoordinator::with_identity(
        TabIdentity::from("a"),
        SyncConfig::default(),
        Arc::new(UnavailableStore),
        Arc::new(crate::NullBus),
        Box::new(output.clone()),
        Arc::new(clock),
        Visibility::Background,
    );

    assert!(tab.is_leader());
    tab.play_sound("x.mp3");
    assert_eq!(tab.playback_state(), PlaybackState::Playing);
    assert_eq!(output.attempts(), vec!["x.mp3"]);
}

#[test]
fn test_standalone_always_leads() {
    let mut election = Standalone::new(TabIdentity::from("solo"));
    assert!(election.is_leader());
    assert!(!election.observe_activity(1_000_000, &TabIdentity::from("other")));
    assert_eq!(election.assert_activity(42), 42);
    assert!(election.refresh(99, true).is_none());

    let output = OutputProbe::default();
    let mut tab = TabCoordinator::standalone(
        SyncConfig::default(),
        Box::new(output.clone()),
        Arc::new(ManualClock::new(0)),
        Visibility::Background,
    );
    tab.play_sound("solo.mp3");
    assert!(tab.is_playing());
}

#[test]
fn test_abandoned_leader_wedges_without_expiry() {
    let mut h = Harness::new();
    let a = h.open("a", Visibility::Foreground);
    let b = h.open("b", Visibility::Background);
    h.settle();

    // Tab a goes away without a final broadcast.
    h.tabs.remove(a);
    let b = b - 1;
    h.tab(b).set_visibility(Visibility::Background);
    h.clock.advance(Duration::from_secs(3600));
    h.tab(b).tick();

    assert!(!h.tab(b).is_leader());
    assert_eq!(h.tab(b).play_sound("x.mp3"), crate::EnqueueOutcome::NotLeader);
}

#[test]
fn test_visible_tab_takes_over_abandoned_leader() {
    let config = SyncConfig::default().with_stale_leader_after(Duration::from_secs(30));
    let mut h = Harness::new();
    // Two visible windows side by side; a was focused last.
    let _b = h.open_with("b", Visibility::Foreground, config.clone());
    let _a = h.open_with("a", Visibility::Foreground, config);
    h.settle();
    assert!(!h.tab(0).is_leader());

    // a crashes without a final broadcast.
    h.tabs.remove(1);
    let b = 0;

    h.clock.advance(Duration::from_secs(10));
    h.tab(b).tick();
    assert!(!h.tab(b).is_leader());

    h.clock.advance(Duration::from_secs(25));
    h.tab(b).tick();
    assert!(h.tab(b).is_leader());
    assert_eq!(record(&h).leader, Some(TabIdentity::from("b")));
}

#[test]
fn test_stale_leader_takeover_requires_foreground() {
    let config = SyncConfig::default().with_stale_leader_after(Duration::from_secs(30));
    let store = MemoryStore::new();
    ActivityRecord::new(0, TabIdentity::from("gone"))
        .save(&store)
        .unwrap();

    let mut election = LastWriterWins::new(TabIdentity::from("b"), Arc::new(store.clone()))
        .with_stale_after(config.stale_leader_after);

    assert_eq!(election.refresh(10_000, true), None);
    assert_eq!(election.refresh(40_000, false), None);
    assert_eq!(election.refresh(40_000, true), Some(40_000));
    assert!(election.is_leader());
}

#[test]
fn test_leader_heartbeat_keeps_record_fresh() {
    let config = SyncConfig::default().with_stale_leader_after(Duration::from_secs(30));
    let mut h = Harness::new();
    let b = h.open_with("b", Visibility::Foreground, config.clone());
    let a = h.open_with("a", Visibility::Foreground, config);
    h.tab(a).set_visibility(Visibility::Background);
    h.settle();

    for _ in 0..20 {
        h.clock.advance(Duration::from_secs(3));
        h.tab(a).tick();
        h.tab(b).tick();
    }

    assert!(h.tab(a).is_leader());
    assert!(!h.tab(b).is_leader());
    assert_eq!(record(&h).last_active_timestamp, h.clock.now_millis());
}

#[test]
fn test_heartbeat_does_not_overwrite_a_fresh_claim() {
    let memory = MemoryStore::new();
    let store = Arc::new(ClaimAfterReads::new(memory.clone()));
    let mut a = LastWriterWins::new(TabIdentity::from("a"), store.clone())
        .with_stale_after(Some(Duration::from_secs(30)));
    a.assert_activity(1_000);

    // "b" claims after the heartbeat's first record load (two key reads).
    store.claim_after(2, ActivityRecord::new(4_000, TabIdentity::from("b")));
    assert_eq!(a.refresh(5_000, false), None);

    let rec = ActivityRecord::load(&memory).unwrap();
    assert_eq!(rec.leader, Some(TabIdentity::from("b")));
    assert_eq!(rec.last_active_timestamp, 4_000);
    assert_eq!(a.last_active(), 1_000);
    assert!(!a.is_leader());
}
