//! Agreement and contract uploads on accepted applications.

use crate::reconciler::{authorize, invalid_transition, Mutation, Reconciler};
use serde_json::{Map, Value};
use tms_core::{
    Application, ApplicationStatus, DocumentSlot, EntityKind, LifecycleAction, LifecycleResult,
    Principal, RecordIdType, Role, ValidationError,
};
use tms_gateway::{MutationGateway, DOCUMENT_BUCKET};

/// Storage path of a document: `<folder>/<application id>/<file name>`.
pub fn document_path(slot: DocumentSlot, application: &Application, file_name: &str) -> String {
    format!("{}/{}/{}", slot.folder(), application.id, file_name)
}

fn validate_upload(file_name: &str, blob: &[u8]) -> Result<(), ValidationError> {
    if file_name.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "file_name".to_string(),
        });
    }
    if file_name.contains(['/', '\\']) {
        return Err(ValidationError::InvalidValue {
            field: "file_name".to_string(),
            reason: "must not contain path separators".to_string(),
        });
    }
    if blob.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "file".to_string(),
            reason: "is empty".to_string(),
        });
    }
    Ok(())
}

impl<G: MutationGateway> Reconciler<G> {
    /// Upload a document and store its URL on the application.
    ///
    /// The facilitator attaches the agreement, the startup the signed contract.
    pub async fn attach_document(
        &self,
        principal: &Principal,
        application: &Application,
        slot: DocumentSlot,
        file_name: &str,
        blob: Vec<u8>,
    ) -> LifecycleResult<Application> {
        let action = LifecycleAction::AttachDocument;
        let (allowed, reason) = match slot {
            DocumentSlot::Agreement => (
                principal.acts_as(Role::Facilitator),
                "only facilitators attach agreements",
            ),
            DocumentSlot::Contract => (
                principal.owns_startup(&application.startup_id),
                "only the applying startup attaches its contract",
            ),
        };
        authorize(principal, action, allowed, reason)?;

        let entity = EntityKind::Application;
        let id = application.id.as_str();
        if application.status != ApplicationStatus::Accepted {
            return Err(invalid_transition(entity, id, application.status, action));
        }
        let file_name = file_name.trim();
        validate_upload(file_name, &blob)?;

        let _ticket = self.in_flight().acquire(entity, id)?;
        let path = document_path(slot, application, file_name);
        let uploaded = match self.gateway().upload_file(DOCUMENT_BUCKET, &path, blob).await {
            Ok(uploaded) => uploaded,
            Err(err) => return Err(self.gateway_failure(action, entity, None, err).await),
        };
        tracing::debug!(id, path = %uploaded.path, "Document uploaded");

        let mut fields = Map::new();
        fields.insert(slot.url_column().to_string(), Value::String(uploaded.url));
        self.execute(action, entity, Some(id), Mutation::UpdateFields(Value::Object(fields)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tms_core::{DiligenceStatus, GatewayError, LifecycleError};
    use tms_gateway::{GatewayCall, MockGateway};
    use tms_test_utils::assertions::{
        assert_forbidden, assert_invalid_transition, assert_no_mutations,
    };
    use tms_test_utils::fixtures::{application, facilitator, pending_application, startup_owner};

    fn accepted() -> Application {
        application("app-1", ApplicationStatus::Accepted, DiligenceStatus::None)
    }

    #[tokio::test]
    async fn test_facilitator_attaches_agreement() {
        let app = accepted();
        let gateway = MockGateway::new();
        gateway.seed_record(&app).unwrap();
        let reconciler = Reconciler::new(gateway.clone());

        let updated = reconciler
            .attach_document(&facilitator(), &app, DocumentSlot::Agreement, "terms.pdf", b"%PDF".to_vec())
            .await
            .unwrap();

        let expected_path = "agreements/app-1/terms.pdf";
        assert_eq!(
            updated.agreement_url.as_deref(),
            Some(format!("mock://storage/{}/{}", DOCUMENT_BUCKET, expected_path).as_str())
        );
        assert!(updated.contract_url.is_none());
        assert_eq!(gateway.file(DOCUMENT_BUCKET, expected_path), Some(b"%PDF".to_vec()));
        assert!(matches!(
            &gateway.calls()[..],
            [GatewayCall::Upload { .. }, GatewayCall::UpdateFields { .. }]
        ));
    }

    #[tokio::test]
    async fn test_contract_belongs_to_startup() {
        let app = accepted();
        let gateway = MockGateway::new();
        gateway.seed_record(&app).unwrap();
        let reconciler = Reconciler::new(gateway.clone());

        assert_forbidden(
            &reconciler
                .attach_document(&facilitator(), &app, DocumentSlot::Contract, "signed.pdf", vec![1])
                .await,
        );
        let updated = reconciler
            .attach_document(&startup_owner(), &app, DocumentSlot::Contract, "signed.pdf", vec![1])
            .await
            .unwrap();
        assert!(updated.contract_url.is_some());
    }

    #[tokio::test]
    async fn test_documents_need_accepted_application() {
        let app = pending_application("app-1");
        let gateway = MockGateway::new();
        let reconciler = Reconciler::new(gateway.clone());
        assert_invalid_transition(
            &reconciler
                .attach_document(&facilitator(), &app, DocumentSlot::Agreement, "terms.pdf", vec![1])
                .await,
        );
        assert_no_mutations(&gateway);
    }

    #[tokio::test]
    async fn test_bad_file_rejected_before_upload() {
        let app = accepted();
        let gateway = MockGateway::new();
        let reconciler = Reconciler::new(gateway.clone());
        for (name, blob) in [("", vec![1]), ("../x.pdf", vec![1]), ("ok.pdf", vec![])] {
            let result = reconciler
                .attach_document(&facilitator(), &app, DocumentSlot::Agreement, name, blob)
                .await;
            assert!(matches!(result, Err(LifecycleError::Validation(_))), "{:?}", name);
        }
        assert_no_mutations(&gateway);
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_record_untouched() {
        let app = accepted();
        let gateway = MockGateway::new();
        gateway.seed_record(&app).unwrap();
        gateway.fail_next(GatewayError::Storage {
            bucket: DOCUMENT_BUCKET.to_string(),
            reason: "quota".to_string(),
        });
        let reconciler = Reconciler::new(gateway.clone());

        let result = reconciler
            .attach_document(&facilitator(), &app, DocumentSlot::Agreement, "terms.pdf", vec![1])
            .await;
        assert!(matches!(result, Err(LifecycleError::Gateway(GatewayError::Storage { .. }))));
        let stored: Application = gateway.record(EntityKind::Application, "app-1").unwrap();
        assert!(stored.agreement_url.is_none());
        assert_eq!(gateway.call_count(), 1);
    }
}
