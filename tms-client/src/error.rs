//! Error types for the dashboard client.

use crate::config::ConfigError;
use crate::persistence::PersistenceError;
use tms_core::{EntityKind, LifecycleError};
use tms_sync::SyncError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("No local {entity} with id {id}")]
    UnknownRecord { entity: EntityKind, id: String },
    #[error("Dashboard was unmounted before the result arrived")]
    Unmounted,
    #[error("Failed to install log subscriber: {0}")]
    Telemetry(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
