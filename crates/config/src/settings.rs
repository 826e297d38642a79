//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use voice_relay_core::{SampleRate, VoiceParams};

use crate::ConfigError;

/// Runtime environment enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Diagnostics server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Resource pool configuration
    #[serde(default)]
    pub pool: PoolSettings,

    /// Playback orchestration configuration
    #[serde(default)]
    pub playback: PlaybackSettings,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Diagnostics server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Resource pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Warm queue capacity per pool (0 disables pre-warming)
    #[serde(default = "default_warm_pool_size")]
    pub warm_pool_size: usize,

    /// Enable the per-session dedicated cache
    #[serde(default = "default_true")]
    pub session_awareness: bool,

    /// Enable the periodic refill/eviction task
    #[serde(default = "default_true")]
    pub enable_background_warmup: bool,

    /// Background task interval in seconds
    #[serde(default = "default_warmup_interval_sec")]
    pub warmup_interval_sec: u64,

    /// Session cache entries idle beyond this are evicted
    #[serde(default = "default_session_max_age_sec")]
    pub session_max_age_sec: u64,

    /// Bound on cold construction in milliseconds
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_warm_pool_size() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_warmup_interval_sec() -> u64 {
    30
}

fn default_session_max_age_sec() -> u64 {
    600
}

fn default_acquire_timeout_ms() -> u64 {
    5000
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            warm_pool_size: default_warm_pool_size(),
            session_awareness: true,
            enable_background_warmup: true,
            warmup_interval_sec: default_warmup_interval_sec(),
            session_max_age_sec: default_session_max_age_sec(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

impl PoolSettings {
    pub fn warmup_interval(&self) -> Duration {
        Duration::from_secs(self.warmup_interval_sec)
    }

    pub fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_sec)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

/// Playback orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Bound on the one-time voice warm-up synthesis, in milliseconds
    #[serde(default = "default_warmup_timeout_ms")]
    pub warmup_timeout_ms: u64,

    /// Placeholder text synthesized to warm a voice signature
    #[serde(default = "default_warmup_text")]
    pub warmup_text: String,

    /// Default voice name
    #[serde(default = "default_voice")]
    pub default_voice: String,

    /// Default speaking style
    #[serde(default)]
    pub default_style: Option<String>,

    /// Default speaking rate keyword
    #[serde(default = "default_rate")]
    pub default_rate: String,
}

fn default_warmup_timeout_ms() -> u64 {
    1500
}

fn default_warmup_text() -> String {
    "Okay.".to_string()
}

fn default_voice() -> String {
    "en-IN-NeerjaNeural".to_string()
}

fn default_rate() -> String {
    "medium".to_string()
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            warmup_timeout_ms: default_warmup_timeout_ms(),
            warmup_text: default_warmup_text(),
            default_voice: default_voice(),
            default_style: None,
            default_rate: default_rate(),
        }
    }
}

impl PlaybackSettings {
    pub fn warmup_timeout(&self) -> Duration {
        Duration::from_millis(self.warmup_timeout_ms)
    }

    /// Default voice parameters for requests that carry none
    pub fn voice_params(&self) -> VoiceParams {
        let mut params = VoiceParams::new(&self.default_voice).with_rate(&self.default_rate);
        if let Some(style) = &self.default_style {
            params = params.with_style(style);
        }
        params
    }
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Interactive-session delivery rate in Hz
    #[serde(default = "default_interactive_rate")]
    pub interactive_sample_rate: u32,

    /// Telephony-session delivery rate in Hz
    #[serde(default = "default_telephony_rate")]
    pub telephony_sample_rate: u32,

    /// Frame duration in milliseconds
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u32,

    /// Telephony frames are paced at `frame_ms / divisor`
    #[serde(default = "default_pace_divisor")]
    pub telephony_pace_divisor: u32,
}

fn default_interactive_rate() -> u32 {
    24000
}

fn default_telephony_rate() -> u32 {
    8000
}

fn default_frame_ms() -> u32 {
    20
}

fn default_pace_divisor() -> u32 {
    4
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            interactive_sample_rate: default_interactive_rate(),
            telephony_sample_rate: default_telephony_rate(),
            frame_ms: default_frame_ms(),
            telephony_pace_divisor: default_pace_divisor(),
        }
    }
}

impl TransportSettings {
    pub fn interactive_rate(&self) -> SampleRate {
        sample_rate_from_hz(self.interactive_sample_rate, SampleRate::Hz24000)
    }

    pub fn telephony_rate(&self) -> SampleRate {
        sample_rate_from_hz(self.telephony_sample_rate, SampleRate::Hz8000)
    }
}

fn sample_rate_from_hz(hz: u32, fallback: SampleRate) -> SampleRate {
    match hz {
        8000 => SampleRate::Hz8000,
        16000 => SampleRate::Hz16000,
        22050 => SampleRate::Hz22050,
        24000 => SampleRate::Hz24000,
        48000 => SampleRate::Hz48000,
        _ => {
            tracing::warn!(hz, "Unsupported sample rate, using {:?}", fallback);
            fallback
        },
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON logs instead of human-readable
    #[serde(default)]
    pub log_json: bool,

    /// Enable the Prometheus metrics exporter
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    ///
    /// Strict environments fail; development logs warnings and continues
    /// where safe.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must be non-zero".into()));
        }

        if self.transport.frame_ms == 0 || self.transport.frame_ms > 60 {
            return Err(ConfigError::Validation(format!(
                "transport.frame_ms must be in 1..=60, got {}",
                self.transport.frame_ms
            )));
        }

        if self.transport.telephony_pace_divisor == 0 {
            return Err(ConfigError::Validation(
                "transport.telephony_pace_divisor must be >= 1".into(),
            ));
        }

        if self.pool.enable_background_warmup && self.pool.warmup_interval_sec == 0 {
            return Err(ConfigError::Validation(
                "pool.warmup_interval_sec must be >= 1 when background warmup is enabled".into(),
            ));
        }

        if self.environment.is_strict() && self.pool.warm_pool_size == 0 {
            return Err(ConfigError::Validation(
                "pool.warm_pool_size must be >= 1 outside development".into(),
            ));
        }

        Ok(())
    }
}

/// Load settings from layered sources
///
/// Order (later wins): `config/default.toml`, `config/{env}.toml`,
/// `VOICE_RELAY_*` environment variables with `__` section separators
/// (e.g. `VOICE_RELAY_SERVER__PORT=9000`).
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder().add_source(File::with_name("config/default").required(false));

    if let Some(env) = env {
        builder = builder.add_source(File::with_name(&format!("config/{}", env)).required(false));
    }

    let settings: Settings = builder
        .add_source(Environment::with_prefix("VOICE_RELAY").separator("__"))
        .build()?
        .try_deserialize()?;

    settings.validate()?;
    Ok(settings)
}
