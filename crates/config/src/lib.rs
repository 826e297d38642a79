//! Configuration for voice-relay
//!
//! Settings load from layered sources: `config/default.toml`, an optional
//! per-environment file, then `VOICE_RELAY_*` environment overrides.

pub mod settings;

pub use settings::{
    load_settings, ObservabilityConfig, PlaybackSettings, PoolSettings, RuntimeEnvironment,
    ServerConfig, Settings, TransportSettings,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}
