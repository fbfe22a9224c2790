//! Messages on an application thread.

use crate::reconciler::{authorize, Mutation, Reconciler};
use serde_json::json;
use tms_core::{
    Application, EntityKind, LifecycleAction, LifecycleError, LifecycleResult, Message,
    NewMessage, Principal, RecordIdType, Role, ValidationError,
};
use tms_gateway::MutationGateway;

impl<G: MutationGateway> Reconciler<G> {
    /// Insert `draft` and return the stored message with its server id.
    ///
    /// `draft` is the optimistic copy already shown locally; its local id
    /// keys the in-flight guard.
    pub async fn send_message(
        &self,
        principal: &Principal,
        application: &Application,
        draft: &Message,
    ) -> LifecycleResult<Message> {
        let action = LifecycleAction::SendMessage;
        authorize(
            principal,
            action,
            principal.owns_startup(&application.startup_id) || principal.acts_as(Role::Facilitator),
            "only the startup and its facilitator share this thread",
        )?;
        if draft.sender_id != principal.user_id {
            return Err(LifecycleError::Forbidden {
                action,
                role: principal.role,
                reason: "messages are sent as the signed-in user".to_string(),
            });
        }
        if draft.application_id != application.id {
            return Err(ValidationError::InvalidValue {
                field: "application_id".to_string(),
                reason: format!("message belongs to {}, not {}", draft.application_id, application.id),
            }
            .into());
        }
        let text = draft.text.trim();
        if text.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "text".to_string(),
            }
            .into());
        }

        let entity = EntityKind::Message;
        let _ticket = self.in_flight().acquire(entity, draft.id.as_str())?;
        let new = NewMessage {
            application_id: application.id.clone(),
            sender_id: principal.user_id.clone(),
            text: text.to_string(),
        };
        self.execute(
            action,
            entity,
            None,
            Mutation::Insert(json!({
                "application_id": new.application_id.as_str(),
                "sender_id": new.sender_id.as_str(),
                "text": new.text,
            })),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tms_core::{ApplicationId, UserId};
    use tms_gateway::MockGateway;
    use tms_test_utils::assertions::{assert_forbidden, assert_no_mutations};
    use tms_test_utils::fixtures::{facilitator, investor, pending_application, startup_owner};
    use tms_test_utils::ts;

    fn draft(sender: &str, text: &str) -> Message {
        Message::optimistic(ApplicationId::new("app-1"), UserId::new(sender), text, ts(0))
    }

    #[tokio::test]
    async fn test_send_returns_server_id() {
        let gateway = MockGateway::new();
        let reconciler = Reconciler::new(gateway.clone());
        let local = draft("founder-1", "  Contract signed  ");

        let sent = reconciler
            .send_message(&startup_owner(), &pending_application("app-1"), &local)
            .await
            .unwrap();

        assert!(!sent.id.is_local());
        assert_ne!(sent.id, local.id);
        assert_eq!(sent.text, "Contract signed");
        assert!(!sent.is_optimistic());
        assert_eq!(gateway.row_count(EntityKind::Message), 1);
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let gateway = MockGateway::new();
        let reconciler = Reconciler::new(gateway.clone());
        let result = reconciler
            .send_message(&facilitator(), &pending_application("app-1"), &draft("facilitator-1", "   "))
            .await;
        assert!(matches!(result, Err(LifecycleError::Validation(_))));
        assert_no_mutations(&gateway);
    }

    #[tokio::test]
    async fn test_outsiders_and_impersonation_forbidden() {
        let gateway = MockGateway::new();
        let reconciler = Reconciler::new(gateway.clone());
        let app = pending_application("app-1");

        assert_forbidden(&reconciler.send_message(&investor(), &app, &draft("investor-1", "hi")).await);
        assert_forbidden(&reconciler.send_message(&facilitator(), &app, &draft("founder-1", "hi")).await);
        assert_no_mutations(&gateway);
    }
}
