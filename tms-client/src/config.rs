//! Configuration loading for a dashboard session.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use crate::session::SessionSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tms_sync::ReconnectPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    pub backend_url: String,
    pub preferences_path: PathBuf,
    pub log: LogConfig,
    pub reconnect: ReconnectPolicy,
    pub sync: SyncConfig,
    pub view: ViewConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Overrides the default filter when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Window in which a realtime echo confirms an optimistic message.
    pub echo_window_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewConfig {
    pub page_size: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or TMS_DASHBOARD_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl DashboardConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: DashboardConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.backend_url.trim();
        if url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "backend_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                field: "backend_url",
                reason: "must be an http(s) URL".to_string(),
            });
        }
        if self.preferences_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "preferences_path",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(filter) = &self.log.filter {
            if filter.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "log.filter",
                    reason: "must not be empty when set".to_string(),
                });
            }
        }
        if self.reconnect.initial_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.initial_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.reconnect.max_ms < self.reconnect.initial_ms {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.max_ms",
                reason: "must be >= initial_ms".to_string(),
            });
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.multiplier",
                reason: "must be >= 1.0".to_string(),
            });
        }
        if self.sync.echo_window_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sync.echo_window_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.view.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "view.page_size",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            echo_window: Duration::from_millis(self.sync.echo_window_ms),
            reconnect: self.reconnect,
            page_size: self.view.page_size,
        }
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("TMS_DASHBOARD_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
