//! Error types for change-event consumption

use thiserror::Error;
use tms_core::{EntityKind, GatewayError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Re-delivery of something already applied. Swallowed by the adapter.
    #[error("Duplicate {entity} event for {id}")]
    DuplicateEvent { entity: EntityKind, id: String },

    /// Update for a record deleted at or after the update's timestamp.
    #[error("Stale {entity} event for deleted record {id}")]
    StaleEvent { entity: EntityKind, id: String },

    #[error("Failed to decode {entity} payload: {reason}")]
    Decode { entity: EntityKind, reason: String },

    #[error("Feed error: {0}")]
    Feed(#[from] GatewayError),
}

impl SyncError {
    /// Errors the adapter absorbs without surfacing them.
    pub fn is_benign(&self) -> bool {
        matches!(self, SyncError::DuplicateEvent { .. } | SyncError::StaleEvent { .. })
    }
}

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
