//! Startup invitations sent by facilitators.

use crate::reconciler::{authorize, ensure_transition, Mutation, Reconciler};
use serde_json::json;
use tms_core::{
    EntityKind, InvitationStatus, LifecycleAction, LifecycleResult, NewInvitation, Principal,
    RecordIdType, Role, StartupInvitation,
};
use tms_gateway::MutationGateway;

const ENTITY: EntityKind = EntityKind::StartupInvitation;

impl<G: MutationGateway> Reconciler<G> {
    /// Create a pending invitation on behalf of the acting facilitator.
    pub async fn invite_startup(
        &self,
        principal: &Principal,
        startup_name: &str,
        contact_email: &str,
    ) -> LifecycleResult<StartupInvitation> {
        let action = LifecycleAction::InviteStartup;
        authorize(
            principal,
            action,
            principal.acts_as(Role::Facilitator),
            "only facilitators invite startups",
        )?;
        let invite = NewInvitation {
            facilitator_id: principal.user_id.clone(),
            startup_name: startup_name.trim().to_string(),
            contact_email: contact_email.trim().to_string(),
        };
        invite.validate()?;

        // Keyed by address: there is no id before the insert returns.
        let email_key = invite.contact_email.to_lowercase();
        let _ticket = self.in_flight().acquire(ENTITY, &email_key)?;
        self.execute(
            action,
            ENTITY,
            None,
            Mutation::Insert(json!({
                "facilitator_id": invite.facilitator_id.as_str(),
                "startup_name": invite.startup_name,
                "contact_email": invite.contact_email,
                "status": InvitationStatus::Pending.as_db_str(),
            })),
        )
        .await
    }

    /// Move an invitation one step along pending, sent, accepted or declined.
    pub async fn advance_invitation(
        &self,
        principal: &Principal,
        invitation: &StartupInvitation,
        next: InvitationStatus,
    ) -> LifecycleResult<StartupInvitation> {
        let action = LifecycleAction::AdvanceInvitation;
        let owns = principal.role == Role::Facilitator && principal.user_id == invitation.facilitator_id;
        authorize(
            principal,
            action,
            owns || principal.is_admin(),
            "only the inviting facilitator can update an invitation",
        )?;
        let id = invitation.id.as_str();
        ensure_transition(ENTITY, id, invitation.status, next, action)?;
        let _ticket = self.in_flight().acquire(ENTITY, id)?;
        self.execute(
            action,
            ENTITY,
            Some(id),
            Mutation::UpdateStatus {
                status: next.as_db_str(),
                extra: None,
            },
        )
        .await
    }
}
