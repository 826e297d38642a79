//! Application State
//!
//! Shared state across all handlers.

use parking_lot::RwLock;
use std::sync::Arc;

use voice_relay_config::{load_settings, Settings};
use voice_relay_pool::PoolRegistry;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration wrapped in RwLock for hot-reload support
    pub config: Arc<RwLock<Settings>>,
    /// Pool registry owned by this process
    pub registry: Arc<PoolRegistry>,
    /// Environment name for config reload
    env: Option<String>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Settings, registry: Arc<PoolRegistry>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            registry,
            env: None,
        }
    }

    /// Create new application state with environment name for reload support
    pub fn with_env(config: Settings, registry: Arc<PoolRegistry>, env: Option<String>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            registry,
            env,
        }
    }

    /// Reload configuration from files
    pub fn reload_config(&self) -> Result<(), String> {
        let new_config = load_settings(self.env.as_deref())
            .map_err(|e| format!("Failed to reload config: {}", e))?;

        let mut config = self.config.write();
        *config = new_config;

        tracing::info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Get a read guard to the current configuration
    pub fn get_config(&self) -> parking_lot::RwLockReadGuard<'_, Settings> {
        self.config.read()
    }
}
