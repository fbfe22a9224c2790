//! Log subscriber setup.

use crate::config::{LogConfig, LogFormat};
use crate::error::{ClientError, ClientResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "tms_client=info,tms_lifecycle=info,tms_sync=info,warn";

/// `RUST_LOG` wins, then the configured filter, then [`DEFAULT_FILTER`].
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.filter.as_deref().unwrap_or(DEFAULT_FILTER))
    })
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LogConfig) -> ClientResult<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config));
    let installed = match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    installed.map_err(|e| ClientError::Telemetry(e.to_string()))?;

    tracing::info!(format = ?config.format, "Logging initialized");
    Ok(())
}
