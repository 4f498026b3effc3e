//! SettingsManager: DB-backed settings with defaults and env migration.

use std::collections::HashMap;

use tab_db::Database;

use super::defaults::DEFAULT_SETTINGS;
use super::validation::validate_setting;

/// Wraps [`Database`] to provide high-level settings operations.
pub struct SettingsManager {
    db: Database,
}

impl SettingsManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a setting value. Falls back to default if not in DB.
    pub fn get_setting(&self, key: &str) -> Result<String, anyhow::Error> {
        if let Some(val) = self.db.get_setting(key)? {
            return Ok(val);
        }
        if let Some(def) = DEFAULT_SETTINGS.get(key) {
            return Ok(def.default.to_string());
        }
        anyhow::bail!("setting not found: {key}");
    }

    /// Set a setting value with validation.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        if !DEFAULT_SETTINGS.contains_key(key) {
            anyhow::bail!("unknown setting key: {key}");
        }
        validate_setting(key, value)
            .map_err(|e| anyhow::anyhow!("validation error for {key}: {e}"))?;

        self.db.set_setting(key, value)?;
        Ok(())
    }

    /// Get all settings, filling in defaults for missing keys.
    pub fn get_all_settings(&self) -> Result<HashMap<String, String>, anyhow::Error> {
        let mut result = self.db.get_all_settings()?;
        for (key, def) in DEFAULT_SETTINGS.iter() {
            result
                .entry(key.to_string())
                .or_insert_with(|| def.default.to_string());
        }
        Ok(result)
    }

    /// Initialize default settings in DB (skip existing).
    pub fn initialize_defaults(&self) -> Result<(), anyhow::Error> {
        for (key, def) in DEFAULT_SETTINGS.iter() {
            if self.db.get_setting(key)?.is_some() {
                continue;
            }
            self.db.set_setting(key, def.default)?;
        }
        Ok(())
    }

    /// Copy settings from environment variables into the DB (one-time).
    /// Invalid values are skipped with a warning.
    pub fn migrate_from_env(&self) -> Result<u32, anyhow::Error> {
        let mut migrated = 0u32;
        for key in DEFAULT_SETTINGS.keys() {
            if self.db.get_setting(key)?.is_some() {
                continue;
            }
            let Ok(env_val) = std::env::var(key) else {
                continue;
            };
            if env_val.is_empty() {
                continue;
            }
            if let Err(e) = validate_setting(key, &env_val) {
                tracing::warn!("Ignoring {key} from env: {e}");
                continue;
            }
            self.db.set_setting(key, &env_val)?;
            tracing::info!("Migrated setting from env: {key}");
            migrated += 1;
        }
        if migrated > 0 {
            tracing::info!("Migration completed: {migrated} settings migrated");
        }
        Ok(migrated)
    }
}
