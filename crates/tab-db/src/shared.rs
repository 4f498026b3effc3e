//! Cross-tab coordination keys.
//!
//! Plain last-writer-wins upserts with no compare-and-swap, the same
//! guarantees as the browser storage this table stands in for.

use tab_sync::{SharedStore, TabSyncError};

use crate::{Database, DbError};

const SELECT_SHARED: &str = "SELECT value FROM shared_state WHERE key = ?1";

const UPSERT_SHARED: &str = "INSERT INTO shared_state (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP";

impl Database {
    pub fn get_shared(&self, key: &str) -> Result<Option<String>, DbError> {
        self.lookup(SELECT_SHARED, key)
    }

    pub fn set_shared(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.upsert(UPSERT_SHARED, key, value)?;
        tracing::trace!(key, value, "Shared key written");
        Ok(())
    }
}

impl From<DbError> for TabSyncError {
    fn from(e: DbError) -> Self {
        TabSyncError::Store(e.to_string())
    }
}

impl SharedStore for Database {
    fn read(&self, key: &str) -> tab_sync::Result<Option<String>> {
        Ok(self.get_shared(key)?)
    }

    fn write(&self, key: &str, value: &str) -> tab_sync::Result<()> {
        self.set_shared(key, value)?;
        Ok(())
    }
}
