//! Application review and due-diligence operations.

use crate::reconciler::{authorize, ensure_transition, invalid_transition, Mutation, Reconciler};
use serde_json::{json, Value};
use tms_core::{
    Application, ApplicationStatus, DiligenceStatus, EntityKind, LifecycleAction, LifecycleResult,
    Principal, RecordIdType, Role, StatusMachine,
};
use tms_gateway::{procedures, MutationGateway};

const ENTITY: EntityKind = EntityKind::Application;

impl<G: MutationGateway> Reconciler<G> {
    /// Accept a pending application. Diligence is reset to `none`.
    pub async fn accept_application(
        &self,
        principal: &Principal,
        application: &Application,
    ) -> LifecycleResult<Application> {
        let action = LifecycleAction::AcceptApplication;
        authorize(
            principal,
            action,
            principal.acts_as(Role::Facilitator),
            "only facilitators review applications",
        )?;
        let mut accepted = self
            .set_application_status(
                application,
                ApplicationStatus::Accepted,
                action,
                Some(json!({ "diligence_status": DiligenceStatus::None.as_db_str() })),
            )
            .await?;
        if accepted.diligence_status != DiligenceStatus::None {
            tracing::debug!(
                id = %accepted.id,
                diligence = %accepted.diligence_status,
                "Accepted row kept diligence state, resetting"
            );
            accepted.diligence_status = DiligenceStatus::None;
        }
        Ok(accepted)
    }

    pub async fn reject_application(
        &self,
        principal: &Principal,
        application: &Application,
    ) -> LifecycleResult<Application> {
        let action = LifecycleAction::RejectApplication;
        authorize(
            principal,
            action,
            principal.acts_as(Role::Facilitator),
            "only facilitators review applications",
        )?;
        self.set_application_status(application, ApplicationStatus::Rejected, action, None)
            .await
    }

    /// Soft delete. The row stays with status `withdrawn`.
    pub async fn withdraw_application(
        &self,
        principal: &Principal,
        application: &Application,
    ) -> LifecycleResult<Application> {
        let action = LifecycleAction::WithdrawApplication;
        authorize(
            principal,
            action,
            principal.owns_startup(&application.startup_id) || principal.acts_as(Role::Facilitator),
            "only the applying startup or a facilitator can withdraw an application",
        )?;
        self.set_application_status(application, ApplicationStatus::Withdrawn, action, None)
            .await
    }

    /// Ask the startup for due diligence. Also re-opens a legacy rejected request.
    pub async fn request_diligence(
        &self,
        principal: &Principal,
        application: &Application,
    ) -> LifecycleResult<Application> {
        let action = LifecycleAction::RequestDiligence;
        authorize(
            principal,
            action,
            principal.acts_as(Role::Facilitator),
            "only facilitators request diligence",
        )?;
        ensure_diligence_step(application, DiligenceStatus::Requested, action)?;

        let id = application.id.as_str();
        let _ticket = self.in_flight().acquire(ENTITY, id)?;
        self.execute(
            action,
            ENTITY,
            Some(id),
            Mutation::UpdateFields(json!({
                "diligence_status": DiligenceStatus::Requested.as_db_str()
            })),
        )
        .await
    }

    /// Startup grants a pending diligence request.
    pub async fn approve_diligence(
        &self,
        principal: &Principal,
        application: &Application,
    ) -> LifecycleResult<Application> {
        self.answer_diligence(
            principal,
            application,
            DiligenceStatus::Approved,
            LifecycleAction::ApproveDiligence,
            procedures::APPROVE_DILIGENCE_REQUEST,
        )
        .await
    }

    /// Startup declines a pending diligence request; the facilitator may ask again.
    pub async fn reject_diligence(
        &self,
        principal: &Principal,
        application: &Application,
    ) -> LifecycleResult<Application> {
        self.answer_diligence(
            principal,
            application,
            DiligenceStatus::None,
            LifecycleAction::RejectDiligence,
            procedures::REJECT_DILIGENCE_REQUEST,
        )
        .await
    }

    async fn answer_diligence(
        &self,
        principal: &Principal,
        application: &Application,
        next: DiligenceStatus,
        action: LifecycleAction,
        procedure: &'static str,
    ) -> LifecycleResult<Application> {
        authorize(
            principal,
            action,
            principal.owns_startup(&application.startup_id),
            "only the applying startup answers a diligence request",
        )?;
        ensure_diligence_step(application, next, action)?;

        let id = application.id.as_str();
        let _ticket = self.in_flight().acquire(ENTITY, id)?;
        self.execute(
            action,
            ENTITY,
            Some(id),
            Mutation::Procedure {
                name: procedure,
                args: json!({ "application_id": id }),
            },
        )
        .await
    }

    async fn set_application_status(
        &self,
        application: &Application,
        next: ApplicationStatus,
        action: LifecycleAction,
        extra: Option<Value>,
    ) -> LifecycleResult<Application> {
        let id = application.id.as_str();
        ensure_transition(ENTITY, id, application.status, next, action)?;
        let _ticket = self.in_flight().acquire(ENTITY, id)?;
        self.execute(
            action,
            ENTITY,
            Some(id),
            Mutation::UpdateStatus {
                status: next.as_db_str(),
                extra,
            },
        )
        .await
    }
}

/// Diligence moves only while the application is pending.
fn ensure_diligence_step(
    application: &Application,
    next: DiligenceStatus,
    action: LifecycleAction,
) -> LifecycleResult<()> {
    let id = application.id.as_str();
    if !application.diligence_actions_enabled() {
        return Err(invalid_transition(ENTITY, id, application.status, action));
    }
    if !application.diligence_status.can_transition_to(next) {
        return Err(invalid_transition(
            ENTITY,
            id,
            format!("{} (diligence {})", application.status, application.diligence_status),
            action,
        ));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tms_core::{ApplicationId, LifecycleError};
    use tms_gateway::{GatewayCall, MockGateway};
    use tms_test_utils::assertions::{
        assert_forbidden, assert_invalid_transition, assert_no_mutations,
    };
    use tms_test_utils::fixtures::{
        admin, application, facilitator, investor, other_startup, pending_application,
        startup_owner,
    };

    fn setup(app: &Application) -> (MockGateway, Reconciler<MockGateway>) {
        let gateway = MockGateway::new();
        gateway.seed_record(app).unwrap();
        (gateway.clone(), Reconciler::new(gateway))
    }

    #[tokio::test]
    async fn test_request_diligence_on_accepted_application_fails() {
        let app = application("app-1", ApplicationStatus::Accepted, DiligenceStatus::None);
        let (gateway, reconciler) = setup(&app);

        let result = reconciler.request_diligence(&facilitator(), &app).await;

        assert_invalid_transition(&result);
        assert_no_mutations(&gateway);
    }

    #[tokio::test]
    async fn test_request_diligence_on_pending_application_sets_requested() {
        let app = pending_application("app-1");
        let (gateway, reconciler) = setup(&app);

        let updated = reconciler.request_diligence(&facilitator(), &app).await.unwrap();

        assert_eq!(updated.status, ApplicationStatus::Pending);
        assert_eq!(updated.diligence_status, DiligenceStatus::Requested);
        assert_eq!(gateway.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_request_diligence_twice_is_invalid() {
        let app = application("app-1", ApplicationStatus::Pending, DiligenceStatus::Requested);
        let (gateway, reconciler) = setup(&app);
        let result = reconciler.request_diligence(&facilitator(), &app).await;
        assert_invalid_transition(&result);
        assert_no_mutations(&gateway);
    }

    #[tokio::test]
    async fn test_legacy_rejected_diligence_can_be_requested_again() {
        let app = application("app-1", ApplicationStatus::Pending, DiligenceStatus::Rejected);
        let (_gateway, reconciler) = setup(&app);
        let updated = reconciler.request_diligence(&facilitator(), &app).await.unwrap();
        assert_eq!(updated.diligence_status, DiligenceStatus::Requested);
    }

    #[tokio::test]
    async fn test_approve_diligence_then_accept_resets_diligence() {
        let app = application("app-1", ApplicationStatus::Pending, DiligenceStatus::Requested);
        let (gateway, reconciler) = setup(&app);

        let approved = reconciler.approve_diligence(&startup_owner(), &app).await.unwrap();
        assert_eq!(approved.status, ApplicationStatus::Pending);
        assert_eq!(approved.diligence_status, DiligenceStatus::Approved);
        assert_eq!(
            gateway.procedure_calls(),
            vec![procedures::APPROVE_DILIGENCE_REQUEST.to_string()]
        );

        let accepted = reconciler.accept_application(&facilitator(), &approved).await.unwrap();
        assert_eq!(accepted.status, ApplicationStatus::Accepted);
        assert_eq!(accepted.diligence_status, DiligenceStatus::None);

        let stored: Application = gateway
            .record(EntityKind::Application, "app-1")
            .unwrap();
        assert_eq!(stored.diligence_status, DiligenceStatus::None);
    }

    #[tokio::test]
    async fn test_reject_diligence_resets_to_none() {
        let app = application("app-1", ApplicationStatus::Pending, DiligenceStatus::Requested);
        let (_gateway, reconciler) = setup(&app);
        let updated = reconciler.reject_diligence(&startup_owner(), &app).await.unwrap();
        assert_eq!(updated.diligence_status, DiligenceStatus::None);
    }

    #[tokio::test]
    async fn test_approve_diligence_without_request_is_invalid() {
        let app = pending_application("app-1");
        let (gateway, reconciler) = setup(&app);
        let result = reconciler.approve_diligence(&startup_owner(), &app).await;
        assert_invalid_transition(&result);
        assert_no_mutations(&gateway);
    }

    #[tokio::test]
    async fn test_only_owning_startup_answers_diligence() {
        let app = application("app-1", ApplicationStatus::Pending, DiligenceStatus::Requested);
        let (gateway, reconciler) = setup(&app);

        assert_forbidden(&reconciler.approve_diligence(&other_startup(), &app).await);
        assert_forbidden(&reconciler.approve_diligence(&facilitator(), &app).await);
        assert_no_mutations(&gateway);
    }

    #[tokio::test]
    async fn test_investor_cannot_accept_application() {
        let app = pending_application("app-1");
        let (gateway, reconciler) = setup(&app);
        let result = reconciler.accept_application(&investor(), &app).await;
        assert_forbidden(&result);
        assert_no_mutations(&gateway);
    }

    #[tokio::test]
    async fn test_accept_sends_status_and_diligence_in_one_update() {
        let app = pending_application("app-1");
        let (gateway, reconciler) = setup(&app);
        reconciler.accept_application(&admin(), &app).await.unwrap();

        match &gateway.calls()[..] {
            [GatewayCall::UpdateFields { entity, id, fields }] => {
                assert_eq!(*entity, EntityKind::Application);
                assert_eq!(id, "app-1");
                assert_eq!(fields["status"], "accepted");
                assert_eq!(fields["diligence_status"], "none");
            }
            other => panic!("expected one update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reject_then_withdraw() {
        let app = pending_application("app-1");
        let (_gateway, reconciler) = setup(&app);

        let rejected = reconciler.reject_application(&facilitator(), &app).await.unwrap();
        assert_eq!(rejected.status, ApplicationStatus::Rejected);

        let withdrawn = reconciler
            .withdraw_application(&startup_owner(), &rejected)
            .await
            .unwrap();
        assert_eq!(withdrawn.status, ApplicationStatus::Withdrawn);
        assert_eq!(withdrawn.id, ApplicationId::new("app-1"));
    }

    #[tokio::test]
    async fn test_withdrawn_application_is_terminal() {
        let app = application("app-1", ApplicationStatus::Withdrawn, DiligenceStatus::None);
        let (gateway, reconciler) = setup(&app);
        assert_invalid_transition(&reconciler.accept_application(&facilitator(), &app).await);
        assert_invalid_transition(&reconciler.withdraw_application(&facilitator(), &app).await);
        assert_no_mutations(&gateway);
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_record_untouched() {
        let app = pending_application("app-1");
        let (gateway, reconciler) = setup(&app);
        gateway.fail_next(tms_core::GatewayError::Network {
            reason: "offline".to_string(),
        });

        let err = reconciler.accept_application(&facilitator(), &app).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Gateway(_)));
        let stored: Application = gateway.record(EntityKind::Application, "app-1").unwrap();
        assert_eq!(stored.status, ApplicationStatus::Pending);
        assert!(!reconciler.is_in_flight(EntityKind::Application, "app-1"));
    }
}
