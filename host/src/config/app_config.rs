//! Runtime host configuration loaded from DB + environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tab_sync::SyncConfig;

use super::manager::SettingsManager;
use super::validation::validate_setting;

/// Runtime configuration populated from the settings DB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub tab_count: usize,
    pub liveness_interval_ms: u64,
    /// 0 disables stale-leader expiry.
    pub stale_leader_after_ms: u64,
    pub default_clip_ms: u64,
    /// Empty means `<data dir>/sounds`.
    pub sounds_dir: String,
    pub bus_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tab_count: 3,
            liveness_interval_ms: 3000,
            stale_leader_after_ms: 0,
            default_clip_ms: 1500,
            sounds_dir: String::new(),
            bus_capacity: 256,
        }
    }
}

impl HostConfig {
    /// Load configuration from the settings manager (DB-first, env overrides).
    pub fn load(sm: &SettingsManager) -> Result<Self, anyhow::Error> {
        let g = |key: &str| -> String { sm.get_setting(key).unwrap_or_default() };
        let defaults = Self::default();

        // Environment variable overrides for quick experiments
        let tab_count = env_override("TAB_COUNT", std::env::var("TAB_COUNT").ok())
            .unwrap_or_else(|| parse_or(&g("TAB_COUNT"), defaults.tab_count));
        let liveness_interval_ms = env_override(
            "LIVENESS_INTERVAL_MS",
            std::env::var("LIVENESS_INTERVAL_MS").ok(),
        )
        .unwrap_or_else(|| parse_or(&g("LIVENESS_INTERVAL_MS"), defaults.liveness_interval_ms));

        Ok(Self {
            tab_count: tab_count.max(1),
            liveness_interval_ms,
            stale_leader_after_ms: parse_or(
                &g("STALE_LEADER_AFTER_MS"),
                defaults.stale_leader_after_ms,
            ),
            default_clip_ms: parse_or(&g("DEFAULT_CLIP_MS"), defaults.default_clip_ms),
            sounds_dir: g("SOUNDS_DIR"),
            bus_capacity: parse_or(&g("BUS_CAPACITY"), defaults.bus_capacity).max(1),
        })
    }

    /// Reload config from the settings manager.
    pub fn reload(&mut self, sm: &SettingsManager) -> Result<(), anyhow::Error> {
        *self = Self::load(sm)?;
        Ok(())
    }

    /// Coordination timing handed to every tab.
    pub fn sync_config(&self) -> SyncConfig {
        let config = SyncConfig::default()
            .with_liveness_interval(Duration::from_millis(self.liveness_interval_ms));
        if self.stale_leader_after_ms == 0 {
            return config;
        }
        config.with_stale_leader_after(Duration::from_millis(self.stale_leader_after_ms))
    }

    pub fn default_clip(&self) -> Duration {
        Duration::from_millis(self.default_clip_ms)
    }

    pub fn sounds_dir(&self, data_dir: &Path) -> PathBuf {
        if self.sounds_dir.is_empty() {
            data_dir.join("sounds")
        } else {
            PathBuf::from(&self.sounds_dir)
        }
    }
}

/// Parse an override for `key`, ignoring values the setting would reject.
fn env_override<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Option<T> {
    let raw = raw.filter(|v| !v.is_empty())?;
    if let Err(e) = validate_setting(key, &raw) {
        tracing::warn!("Ignoring {key} override from env: {e}");
        return None;
    }
    raw.parse().ok()
}

fn parse_or<T: std::str::FromStr>(s: &str, default: T) -> T {
    if s.is_empty() {
        return default;
    }
    s.parse().unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tab_db::Database;

    #[test]
    fn test_load_from_db() {
        let sm = SettingsManager::new(Database::open_in_memory().unwrap());
        sm.set_setting("STALE_LEADER_AFTER_MS", "10000").unwrap();
        sm.set_setting("DEFAULT_CLIP_MS", "250").unwrap();

        let config = HostConfig::load(&sm).unwrap();
        assert_eq!(config.stale_leader_after_ms, 10_000);
        assert_eq!(config.default_clip(), Duration::from_millis(250));
        assert_eq!(config.bus_capacity, 256);
    }

    #[test]
    fn test_env_override_is_validated() {
        assert_eq!(env_override::<usize>("TAB_COUNT", Some("4".into())), Some(4));
        assert_eq!(env_override::<usize>("TAB_COUNT", Some("100000".into())), None);
        assert_eq!(env_override::<usize>("TAB_COUNT", Some("lots".into())), None);
        assert_eq!(env_override::<usize>("TAB_COUNT", Some(String::new())), None);
        assert_eq!(env_override::<usize>("TAB_COUNT", None), None);

        assert_eq!(
            env_override::<u64>("LIVENESS_INTERVAL_MS", Some("250".into())),
            Some(250)
        );
        assert_eq!(env_override::<u64>("LIVENESS_INTERVAL_MS", Some("5".into())), None);
    }

    #[test]
    fn test_sync_config_maps_zero_to_disabled() {
        let config = HostConfig {
            liveness_interval_ms: 1000,
            ..HostConfig::default()
        };
        let sync = config.sync_config();
        assert_eq!(sync.liveness_interval, Duration::from_millis(1000));
        assert_eq!(sync.stale_leader_after, None);

        let config = HostConfig {
            liveness_interval_ms: 1000,
            stale_leader_after_ms: 5000,
            ..HostConfig::default()
        };
        assert_eq!(
            config.sync_config().stale_leader_after,
            Some(Duration::from_millis(5000))
        );
    }

    #[test]
    fn test_sounds_dir_defaults_under_data_dir() {
        let config = HostConfig::default();
        assert_eq!(
            config.sounds_dir(Path::new("/data")),
            PathBuf::from("/data/sounds")
        );

        let config = HostConfig {
            sounds_dir: "/srv/sounds".into(),
            ..HostConfig::default()
        };
        assert_eq!(
            config.sounds_dir(Path::new("/data")),
            PathBuf::from("/srv/sounds")
        );
    }
}
