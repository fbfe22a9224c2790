//! Error types for dashboard lifecycle operations

use crate::{AnyRecord, EntityKind, LifecycleAction, Role};
use thiserror::Error;

/// Failures reported by the remote mutation gateway or change feed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Network failure: {reason}")]
    Network { reason: String },

    #[error("Request rejected by backend: {reason}")]
    Rejected { reason: String },

    #[error("Not authorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("Conflict on {entity} with id {id}: {reason}")]
    Conflict {
        entity: EntityKind,
        id: String,
        reason: String,
    },

    #[error("Invalid response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Upload to bucket {bucket} failed: {reason}")]
    Storage { bucket: String, reason: String },

    #[error("Subscription to {entity} failed: {reason}")]
    Subscription { entity: EntityKind, reason: String },
}

impl GatewayError {
    /// Short phrase for user-facing notifications.
    pub fn summary(&self) -> String {
        match self {
            GatewayError::Network { .. } => "the server could not be reached".to_string(),
            GatewayError::Rejected { reason } => format!("the server rejected the request ({})", reason),
            GatewayError::Unauthorized { .. } => "you are not allowed to do that".to_string(),
            GatewayError::NotFound { .. } => "the record no longer exists".to_string(),
            GatewayError::Conflict { .. } => "the record was changed by someone else".to_string(),
            GatewayError::InvalidResponse { .. } => "the server sent an unexpected response".to_string(),
            GatewayError::Storage { .. } => "the file could not be uploaded".to_string(),
            GatewayError::Subscription { .. } => "live updates are unavailable".to_string(),
        }
    }
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Constraint violation on {constraint}: {reason}")]
    ConstraintViolation { constraint: String, reason: String },
}

/// Errors returned by lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    #[error("Cannot {action} {entity} {id}: status is {from}")]
    InvalidTransition {
        entity: EntityKind,
        id: String,
        from: String,
        action: LifecycleAction,
    },

    #[error("Forbidden: {role} may not {action} ({reason})")]
    Forbidden {
        action: LifecycleAction,
        role: Role,
        reason: String,
    },

    #[error("An action on {entity} {id} is already in flight")]
    ActionInFlight { entity: EntityKind, id: String },

    #[error("Remote state of {entity} {id} diverged")]
    Conflict {
        entity: EntityKind,
        id: String,
        /// Authoritative record re-fetched after the conflict, if still present.
        refreshed: Option<Box<AnyRecord>>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl LifecycleError {
    /// Notification text: what failed, and that nothing changed.
    pub fn user_message(&self, action: LifecycleAction, entity: EntityKind) -> String {
        let cause = match self {
            LifecycleError::InvalidTransition { from, .. } => {
                format!("the {} is {}", entity.label(), from)
            }
            LifecycleError::Forbidden { role, .. } => {
                format!("a {} cannot do this", role)
            }
            LifecycleError::ActionInFlight { .. } => {
                "another action on it is still in progress".to_string()
            }
            LifecycleError::Conflict { refreshed, .. } => match refreshed {
                Some(_) => "it was changed elsewhere and has been reloaded".to_string(),
                None => "it was removed elsewhere".to_string(),
            },
            LifecycleError::Validation(err) => err.to_string(),
            LifecycleError::Gateway(err) => err.summary(),
        };
        format!(
            "Could not {} {}: {}. No changes were made.",
            action.verb(),
            entity.label(),
            cause
        )
    }

    /// Whether the failure happened before any gateway call was issued.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            LifecycleError::InvalidTransition { .. }
                | LifecycleError::Forbidden { .. }
                | LifecycleError::ActionInFlight { .. }
                | LifecycleError::Validation(_)
        )
    }
}

/// Result type alias for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Result type alias for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// TESTS
// =============================================================================
