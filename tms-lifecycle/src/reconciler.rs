//! The reconciler: shared execution path for every lifecycle operation.
//!
//! An operation authorizes the principal, checks the transition against the
//! status tables, claims the record in the in-flight guard, then issues its
//! gateway call through [`Reconciler::execute`]. Nothing reaches the gateway
//! unless all three local checks pass.

use crate::guard::InFlightGuard;
use serde_json::Value;
use std::fmt;
use tms_core::{
    AnyRecord, EntityKind, GatewayError, LifecycleAction, LifecycleError, LifecycleResult,
    Principal, Reconcilable, RecordIdType, StatusMachine,
};
use tms_gateway::MutationGateway;

/// The single write call an operation makes.
#[derive(Debug, Clone)]
pub(crate) enum Mutation {
    UpdateFields(Value),
    UpdateStatus {
        status: &'static str,
        extra: Option<Value>,
    },
    Procedure {
        name: &'static str,
        args: Value,
    },
    Insert(Value),
}

/// Applies dashboard actions through a [`MutationGateway`].
pub struct Reconciler<G> {
    gateway: G,
    in_flight: InFlightGuard,
}

impl<G: MutationGateway> Reconciler<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            in_flight: InFlightGuard::new(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Whether an action on the record is currently awaiting the gateway.
    pub fn is_in_flight(&self, entity: EntityKind, id: &str) -> bool {
        self.in_flight.is_active(entity, id)
    }

    pub(crate) fn in_flight(&self) -> &InFlightGuard {
        &self.in_flight
    }

    /// Issue `mutation` and decode the returned row.
    ///
    /// `id` is the record being changed; `None` for inserts, whose id the
    /// server assigns. The caller must already hold the in-flight ticket.
    pub(crate) async fn execute<R: Reconcilable>(
        &self,
        action: LifecycleAction,
        entity: EntityKind,
        id: Option<&str>,
        mutation: Mutation,
    ) -> LifecycleResult<R> {
        let target = id.unwrap_or("<new>");
        tracing::debug!(action = %action, entity = %entity, id = %target, "Issuing gateway call");

        let result = match mutation {
            Mutation::UpdateFields(fields) => self.gateway.update_fields(entity, target, fields).await,
            Mutation::UpdateStatus { status, extra } => {
                self.gateway.update_status(entity, target, status, extra).await
            }
            Mutation::Procedure { name, args } => self.gateway.call_procedure(name, args).await,
            Mutation::Insert(fields) => self.gateway.insert_record(entity, fields).await,
        };

        let row = match result {
            Ok(row) => row,
            Err(err) => return Err(self.gateway_failure(action, entity, id, err).await),
        };
        let record: R = decode_row(entity, id, row)?;
        tracing::info!(
            action = %action,
            entity = %entity,
            id = %record.id(),
            "Lifecycle action applied"
        );
        Ok(record)
    }

    /// Turn a gateway failure into the operation's error.
    ///
    /// A conflict on an existing record triggers one refetch of the
    /// authoritative copy. If the refetch fails too, the original error
    /// is returned.
    pub(crate) async fn gateway_failure(
        &self,
        action: LifecycleAction,
        entity: EntityKind,
        id: Option<&str>,
        err: GatewayError,
    ) -> LifecycleError {
        let (GatewayError::Conflict { .. }, Some(id)) = (&err, id) else {
            tracing::warn!(action = %action, entity = %entity, error = %err, "Gateway call failed");
            return LifecycleError::Gateway(err);
        };

        tracing::warn!(action = %action, entity = %entity, id, error = %err, "Remote state diverged, refetching");
        match self.gateway.fetch_record(entity, id).await {
            Ok(Some(row)) => match AnyRecord::decode(entity, row) {
                Ok(record) if record.id_str() == id => LifecycleError::Conflict {
                    entity,
                    id: id.to_string(),
                    refreshed: Some(Box::new(record)),
                },
                Ok(record) => {
                    tracing::warn!(entity = %entity, id, returned = record.id_str(), "Refetch returned another record");
                    LifecycleError::Gateway(err)
                }
                Err(decode_err) => {
                    tracing::warn!(entity = %entity, id, error = %decode_err, "Refetched row did not decode");
                    LifecycleError::Gateway(err)
                }
            },
            Ok(None) => LifecycleError::Conflict {
                entity,
                id: id.to_string(),
                refreshed: None,
            },
            Err(fetch_err) => {
                tracing::warn!(entity = %entity, id, error = %fetch_err, "Conflict refetch failed");
                LifecycleError::Gateway(err)
            }
        }
    }
}

/// Decode a returned row, checking it is the record that was changed.
pub(crate) fn decode_row<R: Reconcilable>(
    entity: EntityKind,
    expected_id: Option<&str>,
    row: Value,
) -> LifecycleResult<R> {
    let record: R = serde_json::from_value(row).map_err(|e| GatewayError::InvalidResponse {
        reason: format!("{} row did not decode: {}", entity, e),
    })?;
    if let Some(expected) = expected_id {
        if record.id().as_str() != expected {
            return Err(GatewayError::InvalidResponse {
                reason: format!(
                    "expected {} {} in response, got {}",
                    entity,
                    expected,
                    record.id().as_str()
                ),
            }
            .into());
        }
    }
    Ok(record)
}

// ============================================================================
// LOCAL CHECKS
// ============================================================================

/// Fail unless `current -> next` is in the status table.
pub(crate) fn ensure_transition<S: StatusMachine>(
    entity: EntityKind,
    id: &str,
    current: S,
    next: S,
    action: LifecycleAction,
) -> LifecycleResult<()> {
    if current.can_transition_to(next) {
        return Ok(());
    }
    Err(invalid_transition(entity, id, current, action))
}

pub(crate) fn invalid_transition(
    entity: EntityKind,
    id: &str,
    from: impl fmt::Display,
    action: LifecycleAction,
) -> LifecycleError {
    let from = from.to_string();
    tracing::debug!(action = %action, entity = %entity, id, from = %from, "Transition refused");
    LifecycleError::InvalidTransition {
        entity,
        id: id.to_string(),
        from,
        action,
    }
}

/// Fail with `Forbidden` unless `allowed`.
pub(crate) fn authorize(
    principal: &Principal,
    action: LifecycleAction,
    allowed: bool,
    reason: &str,
) -> LifecycleResult<()> {
    if allowed {
        return Ok(());
    }
    tracing::debug!(action = %action, role = %principal.role, user = %principal.user_id, "Action forbidden");
    Err(LifecycleError::Forbidden {
        action,
        role: principal.role,
        reason: reason.to_string(),
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tms_core::{Application, ApplicationStatus, DiligenceStatus};
    use tms_gateway::MockGateway;
    use tms_test_utils::fixtures::{application, pending_application};

    #[test]
    fn test_decode_row_rejects_other_id() {
        let row = serde_json::to_value(pending_application("app-2")).unwrap();
        let result: LifecycleResult<Application> =
            decode_row(EntityKind::Application, Some("app-1"), row);
        assert!(matches!(
            result,
            Err(LifecycleError::Gateway(GatewayError::InvalidResponse { .. }))
        ));
    }

    #[test]
    fn test_decode_row_rejects_malformed_row() {
        let result: LifecycleResult<Application> =
            decode_row(EntityKind::Application, None, json!({"id": "app-1"}));
        assert!(matches!(
            result,
            Err(LifecycleError::Gateway(GatewayError::InvalidResponse { .. }))
        ));
    }

    #[test]
    fn test_ensure_transition_reports_current_status() {
        let err = ensure_transition(
            EntityKind::Application,
            "app-1",
            ApplicationStatus::Withdrawn,
            ApplicationStatus::Accepted,
            LifecycleAction::AcceptApplication,
        )
        .unwrap_err();
        match err {
            LifecycleError::InvalidTransition { from, .. } => assert_eq!(from, "withdrawn"),
            other => panic!("expected InvalidTransition, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_conflict_refetches_authoritative_record() {
        let gateway = MockGateway::new();
        let stored = application("app-1", ApplicationStatus::Rejected, DiligenceStatus::None);
        gateway.seed_record(&stored).unwrap();
        gateway.fail_next(GatewayError::Conflict {
            entity: EntityKind::Application,
            id: "app-1".to_string(),
            reason: "stale".to_string(),
        });

        let reconciler = Reconciler::new(gateway.clone());
        let result: LifecycleResult<Application> = reconciler
            .execute(
                LifecycleAction::AcceptApplication,
                EntityKind::Application,
                Some("app-1"),
                Mutation::UpdateStatus {
                    status: "accepted",
                    extra: None,
                },
            )
            .await;

        match result {
            Err(LifecycleError::Conflict { refreshed: Some(record), .. }) => {
                assert_eq!(*record, AnyRecord::Application(stored));
            }
            other => panic!("expected Conflict with refreshed record, got {:?}", other),
        }
        assert_eq!(gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn test_conflict_on_removed_record_has_no_refresh() {
        let gateway = MockGateway::new();
        gateway.fail_next(GatewayError::Conflict {
            entity: EntityKind::Application,
            id: "gone".to_string(),
            reason: "deleted".to_string(),
        });
        let reconciler = Reconciler::new(gateway);
        let result: LifecycleResult<Application> = reconciler
            .execute(
                LifecycleAction::RejectApplication,
                EntityKind::Application,
                Some("gone"),
                Mutation::UpdateFields(json!({"status": "rejected"})),
            )
            .await;
        assert!(matches!(
            result,
            Err(LifecycleError::Conflict { refreshed: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_original_error() {
        let gateway = MockGateway::new();
        let conflict = GatewayError::Conflict {
            entity: EntityKind::Application,
            id: "app-1".to_string(),
            reason: "stale".to_string(),
        };
        gateway.fail_next(conflict.clone());
        gateway.fail_next(GatewayError::Network {
            reason: "offline".to_string(),
        });
        let reconciler = Reconciler::new(gateway);
        let result: LifecycleResult<Application> = reconciler
            .execute(
                LifecycleAction::AcceptApplication,
                EntityKind::Application,
                Some("app-1"),
                Mutation::UpdateFields(json!({"status": "accepted"})),
            )
            .await;
        match result {
            Err(LifecycleError::Gateway(err)) => assert_eq!(err, conflict),
            other => panic!("expected original conflict, got {:?}", other),
        }
    }
}
