use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tab_db::Database;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::bus::TokioBus;
use crate::config::{HostConfig, SettingsManager};

/// State shared by every tab worker in the process.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<SharedStateInner>,
}

struct SharedStateInner {
    /// Cross-tab message bus
    bus: TokioBus,
    /// Host configuration (reloadable)
    config: RwLock<HostConfig>,
    /// Database handle, also the shared activity store
    db: Database,
    /// Data directory path
    data_dir: PathBuf,
    /// Cancels tab workers on shutdown
    shutdown: CancellationToken,
}

impl SharedState {
    /// Create shared state from an already-opened database and loaded config.
    pub fn new(db: Database, config: HostConfig, data_dir: PathBuf) -> Self {
        let bus = TokioBus::new(config.bus_capacity);

        Self {
            inner: Arc::new(SharedStateInner {
                bus,
                config: RwLock::new(config),
                db,
                data_dir,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn bus(&self) -> &TokioBus {
        &self.inner.bus
    }

    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.inner.data_dir
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Get a read lock on the current config.
    pub async fn config(&self) -> tokio::sync::RwLockReadGuard<'_, HostConfig> {
        self.inner.config.read().await
    }

    /// Validate and store one setting, then reload the config.
    pub async fn update_setting(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        SettingsManager::new(self.inner.db.clone()).set_setting(key, value)?;
        self.reload_config().await?;
        tracing::info!("Setting updated: {key}={value}");
        Ok(())
    }

    /// All settings with defaults filled in.
    pub fn settings(&self) -> Result<HashMap<String, String>, anyhow::Error> {
        SettingsManager::new(self.inner.db.clone()).get_all_settings()
    }

    /// Reload config from the database. Running tabs keep their timing;
    /// tabs spawned afterwards pick up the new values.
    pub async fn reload_config(&self) -> Result<(), anyhow::Error> {
        let sm = SettingsManager::new(self.inner.db.clone());
        let mut config = self.inner.config.write().await;
        config.reload(&sm)?;
        Ok(())
    }
}
