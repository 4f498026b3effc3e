pub mod app;
pub mod audio;
pub mod bus;
pub mod config;
pub mod console;
pub mod shutdown;
pub mod tab;

use std::path::PathBuf;

use tab_db::Database;

use config::{HostConfig, SettingsManager};

/// Determine the data directory for the application.
/// Priority: TABSOUND_DATA_DIR env var > ~/.tabsound
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TABSOUND_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tabsound")
}

/// Load .env from multiple candidate paths.
pub fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}

/// Open the DB, migrate settings, and load the host config.
pub fn init_foundation() -> Result<(Database, HostConfig, PathBuf), anyhow::Error> {
    load_dotenv();

    let dir = data_dir();
    std::fs::create_dir_all(&dir)?;
    let db_path = dir.join("tabsound.db");

    tracing::info!("Opening database at {}", db_path.display());
    let db = Database::open(&db_path)?;

    let sm = SettingsManager::new(db.clone());

    // Migrate settings from environment variables (one-time)
    if let Err(e) = sm.migrate_from_env() {
        tracing::error!("Failed to migrate from env: {e}");
    }

    sm.initialize_defaults()?;
    let config = HostConfig::load(&sm)?;

    let sounds = config.sounds_dir(&dir);
    if !sounds.is_dir() {
        tracing::warn!("Sounds directory {} does not exist", sounds.display());
    }

    tracing::info!(
        "Settings loaded (tabs={}, liveness={}ms, stale_after={}ms)",
        config.tab_count,
        config.liveness_interval_ms,
        config.stale_leader_after_ms
    );
    Ok((db, config, dir))
}
