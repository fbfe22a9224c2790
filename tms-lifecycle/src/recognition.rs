//! Recognition record approval.

use crate::reconciler::{authorize, ensure_transition, Mutation, Reconciler};
use serde_json::json;
use tms_core::{
    EntityKind, LifecycleAction, LifecycleResult, Principal, RecognitionRecord, RecognitionStatus,
    RecordIdType,
};
use tms_gateway::{procedures, MutationGateway};

impl<G: MutationGateway> Reconciler<G> {
    /// Approve a recognition record for the facilitator holding its code.
    ///
    /// Idempotent: an already approved record is returned as is, without a
    /// gateway call.
    pub async fn approve_recognition_record(
        &self,
        principal: &Principal,
        record: &RecognitionRecord,
    ) -> LifecycleResult<RecognitionRecord> {
        let action = LifecycleAction::ApproveRecognition;
        authorize(
            principal,
            action,
            principal.holds_facilitator_code(&record.facilitator_code),
            "only the facilitator named on the record can approve it",
        )?;
        if record.status == RecognitionStatus::Approved {
            tracing::debug!(id = %record.id, "Recognition record already approved");
            return Ok(record.clone());
        }
        record.validate()?;

        let entity = EntityKind::RecognitionRecord;
        let id = record.id.as_str();
        ensure_transition(entity, id, record.status, RecognitionStatus::Approved, action)?;
        let _ticket = self.in_flight().acquire(entity, id)?;
        self.execute(
            action,
            entity,
            Some(id),
            Mutation::Procedure {
                name: procedures::APPROVE_RECOGNITION_RECORD,
                args: json!({ "record_id": id }),
            },
        )
        .await
    }
}
