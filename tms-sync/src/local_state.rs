//! All local stores of a dashboard, fed by decoded change events.

use crate::error::{SyncError, SyncResult};
use crate::message_log::MessageLog;
use crate::store::{MergeOutcome, RecordStore};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tms_core::{
    AnyRecord, Application, ApplicationId, EntityKind, InvestmentOffer, InvitationId, Message,
    MessageId, OfferId, RecognitionId, RecognitionRecord, RecordIdType, StartupInvitation,
};
use tms_gateway::{ChangeEvent, ChangeOperation};

/// What applying a change event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Merged(MergeOutcome),
    Removed,
    /// Duplicate or stale, dropped without touching the stores.
    Swallowed,
}

#[derive(Debug, Clone, Default)]
pub struct LocalState {
    pub applications: RecordStore<Application>,
    /// Direct and co-investment offers share one store; ids are unique across both.
    pub offers: RecordStore<InvestmentOffer>,
    pub recognitions: RecordStore<RecognitionRecord>,
    pub invitations: RecordStore<StartupInvitation>,
    pub messages: MessageLog,
}

fn decode<T: DeserializeOwned>(event: &ChangeEvent) -> SyncResult<T> {
    serde_json::from_value(event.payload.clone()).map_err(|e| SyncError::Decode {
        entity: event.entity,
        reason: e.to_string(),
    })
}

impl LocalState {
    pub fn new(echo_window: Duration) -> Self {
        Self {
            messages: MessageLog::new(echo_window),
            ..Self::default()
        }
    }

    /// Apply one change event. Duplicates and stale updates are swallowed.
    pub fn ingest(&mut self, event: &ChangeEvent) -> SyncResult<Applied> {
        match self.apply_event(event) {
            Err(err) if err.is_benign() => {
                tracing::debug!(
                    entity = %event.entity,
                    operation = ?event.operation,
                    error = %err,
                    "Change event swallowed"
                );
                Ok(Applied::Swallowed)
            }
            other => other,
        }
    }

    fn apply_event(&mut self, event: &ChangeEvent) -> SyncResult<Applied> {
        if event.operation == ChangeOperation::Delete {
            let id = event.record_id().ok_or_else(|| SyncError::Decode {
                entity: event.entity,
                reason: "delete event without id".to_string(),
            })?;
            self.apply_delete(event, id);
            return Ok(Applied::Removed);
        }

        let committed_at = event.commit_timestamp;
        let outcome = match event.entity {
            EntityKind::Application => {
                self.applications.apply_upsert(decode(event)?, committed_at)?
            }
            EntityKind::InvestmentOffer | EntityKind::CoInvestmentOffer => {
                self.offers.apply_upsert(decode(event)?, committed_at)?
            }
            EntityKind::RecognitionRecord => {
                self.recognitions.apply_upsert(decode(event)?, committed_at)?
            }
            EntityKind::StartupInvitation => {
                self.invitations.apply_upsert(decode(event)?, committed_at)?
            }
            EntityKind::Message => {
                let message: Message = decode(event)?;
                self.messages.apply_insert(message)?;
                MergeOutcome::Inserted
            }
        };
        Ok(Applied::Merged(outcome))
    }

    fn apply_delete(&mut self, event: &ChangeEvent, id: &str) {
        let at = event.commit_timestamp;
        let removed = match event.entity {
            EntityKind::Application => self.applications.apply_delete(&ApplicationId::new(id), at),
            EntityKind::InvestmentOffer | EntityKind::CoInvestmentOffer => {
                self.offers.apply_delete(&OfferId::new(id), at)
            }
            EntityKind::RecognitionRecord => self.recognitions.apply_delete(&RecognitionId::new(id), at),
            EntityKind::StartupInvitation => self.invitations.apply_delete(&InvitationId::new(id), at),
            EntityKind::Message => self.messages.apply_delete(&MessageId::new(id)),
        };
        tracing::debug!(entity = %event.entity, id, removed, "Remote delete applied");
    }

    /// Install a record returned by a successful mutation or a conflict refetch.
    pub fn replace_authoritative(&mut self, record: AnyRecord) {
        match record {
            AnyRecord::Application(r) => self.applications.replace_authoritative(r),
            AnyRecord::Offer(r) => self.offers.replace_authoritative(r),
            AnyRecord::Recognition(r) => self.recognitions.replace_authoritative(r),
            AnyRecord::Invitation(r) => self.invitations.replace_authoritative(r),
            AnyRecord::Message(r) => {
                if self.messages.apply_insert(r).is_err() {
                    tracing::debug!("Authoritative message already present");
                }
            }
        }
    }

    /// Drop a record the backend no longer has. Returns whether it was present.
    pub fn remove_authoritative(&mut self, entity: EntityKind, id: &str) -> bool {
        match entity {
            EntityKind::Application => self
                .applications
                .remove_authoritative(&ApplicationId::new(id))
                .is_some(),
            EntityKind::InvestmentOffer | EntityKind::CoInvestmentOffer => {
                self.offers.remove_authoritative(&OfferId::new(id)).is_some()
            }
            EntityKind::RecognitionRecord => self
                .recognitions
                .remove_authoritative(&RecognitionId::new(id))
                .is_some(),
            EntityKind::StartupInvitation => self
                .invitations
                .remove_authoritative(&InvitationId::new(id))
                .is_some(),
            EntityKind::Message => self.messages.apply_delete(&MessageId::new(id)),
        }
    }
}
