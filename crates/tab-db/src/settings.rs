//! Host configuration values, one row per setting key.
//!
//! Defaults and validation live with the host; this table only stores what
//! was explicitly set or migrated.

use std::collections::HashMap;

use crate::{Database, DbError};

const SELECT_SETTING: &str = "SELECT value FROM settings WHERE key = ?1";

const UPSERT_SETTING: &str = "INSERT INTO settings (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP";

impl Database {
    pub fn get_setting(&self, key: &str) -> Result<Option<String>, DbError> {
        self.lookup(SELECT_SETTING, key)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.upsert(UPSERT_SETTING, key, value)
    }

    /// Every stored setting, keyed by name.
    pub fn get_all_settings(&self) -> Result<HashMap<String, String>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
            let settings = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<HashMap<String, String>, _>>()?;
            Ok(settings)
        })
    }
}
