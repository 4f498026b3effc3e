//! Shared coordination store.
//!
//! A synchronous key/value store visible to every tab of an origin, with no
//! locking and no transactions. The only persisted state is the
//! [`ActivityRecord`], split across two keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::identity::TabIdentity;
use crate::{Result, TabSyncError};

/// Key holding the timestamp of the most recent activity claim.
pub const LAST_ACTIVE_TIMESTAMP_KEY: &str = "lastActiveTimestamp";

/// Key holding the identity of the tab that made that claim.
pub const LAST_ACTIVE_TAB_KEY: &str = "lastActiveTabIdentity";

/// Synchronous key/value store shared by all tabs.
pub trait SharedStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store. Clones share the same map, so one `MemoryStore` can back
/// any number of simulated tabs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SharedStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| TabSyncError::Store("memory store lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TabSyncError::Store("memory store lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The single logical activity record shared by all tabs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityRecord {
    pub last_active_timestamp: i64,
    pub leader: Option<TabIdentity>,
}

impl ActivityRecord {
    pub fn new(last_active_timestamp: i64, leader: TabIdentity) -> Self {
        Self {
            last_active_timestamp,
            leader: Some(leader),
        }
    }

    /// Read the record. A missing or unparsable timestamp reads as `0`,
    /// a missing or empty identity as "no leader".
    pub fn load(store: &dyn SharedStore) -> Result<Self> {
        let last_active_timestamp = match store.read(LAST_ACTIVE_TIMESTAMP_KEY)? {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::debug!(value = %raw, "Unparsable activity timestamp, treating as 0");
                0
            }),
            None => 0,
        };
        let leader = store
            .read(LAST_ACTIVE_TAB_KEY)?
            .filter(|id| !id.is_empty())
            .map(TabIdentity::from);

        Ok(Self {
            last_active_timestamp,
            leader,
        })
    }

    /// Overwrite the record. The two keys are written independently, so a
    /// concurrent reader may see a torn pair.
    pub fn save(&self, store: &dyn SharedStore) -> Result<()> {
        store.write(
            LAST_ACTIVE_TIMESTAMP_KEY,
            &self.last_active_timestamp.to_string(),
        )?;
        let leader = self.leader.as_ref().map(TabIdentity::as_str).unwrap_or("");
        store.write(LAST_ACTIVE_TAB_KEY, leader)?;
        Ok(())
    }
}
