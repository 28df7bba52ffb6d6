//! Konfiguration des Panels
//!
//! One TOML file at `~/.config/dalek-remote/config.toml`. A file with the
//! defaults is written on first start; missing sections and keys fall back to
//! their defaults so older files keep loading.

use crate::input::voice::DEFAULT_PHRASES;
use crate::input::{
    DEFAULT_CAMERA_REFRESH_MS, DEFAULT_CONTROL_INTERVAL_MS, DEFAULT_JOYSTICK_THRESHOLD,
    DEFAULT_MEDIA_INTERVAL_MS,
};
use crate::session::{SessionSettings, DEFAULT_RECONNECT_DELAY_MS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/dalek-remote";
const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 12346;
pub const DEFAULT_LOW_BATTERY_THRESHOLD: f64 = 5.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct RemoteConfig {
    pub connection: ConnectionConfig,
    pub input: InputConfig,
    pub gamepad: GamepadConfig,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub reconnect_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Key repeat, joystick and slider throttle
    pub control_interval_ms: u64,
    /// Snapshot and sound throttle
    pub media_interval_ms: u64,
    pub joystick_threshold: f64,
    pub camera_refresh_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            control_interval_ms: DEFAULT_CONTROL_INTERVAL_MS,
            media_interval_ms: DEFAULT_MEDIA_INTERVAL_MS,
            joystick_threshold: DEFAULT_JOYSTICK_THRESHOLD,
            camera_refresh_ms: DEFAULT_CAMERA_REFRESH_MS,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GamepadConfig {
    pub enabled: bool,
    pub deadzone: f32,
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            deadzone: 0.05,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub low_battery_threshold: f64,
    pub fullscreen: bool,
    pub phrases: Vec<String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            low_battery_threshold: DEFAULT_LOW_BATTERY_THRESHOLD,
            fullscreen: false,
            phrases: DEFAULT_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Start with per-frame logging raised to info
    pub verbose: bool,
}

impl RemoteConfig {
    /// `~/.config/dalek-remote/config.toml`
    pub fn default_path() -> PathBuf {
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Writes a default config file unless one already exists.
    pub async fn ensure_default_config(path: &Path) -> Result<(), ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if exists {
            debug!("Config file {} present", path.display());
            return Ok(());
        }

        info!("Creating default configuration at {}", path.display());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        RemoteConfig::default().save(path).await
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config: RemoteConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.host.trim().is_empty() {
            return Err(invalid("connection.host", "must not be empty"));
        }
        if self.connection.port == 0 {
            return Err(invalid("connection.port", "must not be 0"));
        }
        if self.connection.reconnect_delay_ms == 0 {
            return Err(invalid("connection.reconnect_delay_ms", "must not be 0"));
        }
        if !(0.0..1.0).contains(&self.input.joystick_threshold) {
            return Err(invalid(
                "input.joystick_threshold",
                format!("{} is outside [0, 1)", self.input.joystick_threshold),
            ));
        }
        if !(0.0..1.0).contains(&self.gamepad.deadzone) {
            return Err(invalid(
                "gamepad.deadzone",
                format!("{} is outside [0, 1)", self.gamepad.deadzone),
            ));
        }
        if !self.ui.low_battery_threshold.is_finite() || self.ui.low_battery_threshold < 0.0 {
            return Err(invalid(
                "ui.low_battery_threshold",
                format!("{} is not a battery level", self.ui.low_battery_threshold),
            ));
        }
        if self.ui.phrases.is_empty() {
            warn!("No phrases configured, the voice menu will be empty");
        }
        Ok(())
    }

    /// Endpoint of the device. `host_override` wins over the configured host.
    pub fn endpoint_url(&self, host_override: Option<&str>) -> String {
        let host = host_override.unwrap_or(&self.connection.host);
        format!("ws://{}:{}", host, self.connection.port)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            reconnect_delay: Duration::from_millis(self.connection.reconnect_delay_ms),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}
