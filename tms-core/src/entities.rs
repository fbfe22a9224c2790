//! Core record structures
//!
//! These are client-side copies of backend rows. The backend owns them; the
//! client only ever holds the latest version it has seen.

use crate::{
    ApplicationId, ApplicationStatus, ApprovalStatus, CoInvestmentOpportunityId, DiligenceStatus,
    DocumentSlot, EntityKind, FacilitatorCode, FeeType, InvitationId, InvitationStatus, MessageId,
    OfferId, OfferStage, OpportunityId, RecognitionId, RecognitionStatus, RecordIdType,
    StartupId, StatusMachine, Timestamp, UserId, ValidationError,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// RECONCILABLE
// ============================================================================

/// A record the client can merge into a local set.
pub trait Reconcilable:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Id: RecordIdType;

    /// Table this record lives in. Offers route by kind.
    fn entity_kind(&self) -> EntityKind;

    fn id(&self) -> &Self::Id;

    /// Server-assigned modification time, if the row carries one.
    fn server_timestamp(&self) -> Option<Timestamp>;

    /// Rank of the record's status; more settled states rank higher.
    fn settlement_rank(&self) -> u8;

    fn created_at(&self) -> Timestamp;
}

// ============================================================================
// APPLICATION
// ============================================================================

/// A startup's application to a facilitator opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub startup_id: StartupId,
    pub opportunity_id: OpportunityId,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default)]
    pub diligence_status: DiligenceStatus,
    pub agreement_url: Option<String>,
    pub contract_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
}

impl Application {
    /// Diligence can only be requested, approved or rejected while pending.
    pub fn diligence_actions_enabled(&self) -> bool {
        self.status == ApplicationStatus::Pending
    }

    pub fn document_url(&self, slot: DocumentSlot) -> Option<&str> {
        match slot {
            DocumentSlot::Agreement => self.agreement_url.as_deref(),
            DocumentSlot::Contract => self.contract_url.as_deref(),
        }
    }
}

impl Reconcilable for Application {
    type Id = ApplicationId;

    fn entity_kind(&self) -> EntityKind {
        EntityKind::Application
    }

    fn id(&self) -> &ApplicationId {
        &self.id
    }

    fn server_timestamp(&self) -> Option<Timestamp> {
        self.updated_at
    }

    /// Status dominates; diligence progress breaks ties within one status.
    fn settlement_rank(&self) -> u8 {
        self.status.settlement_rank() * 3 + self.diligence_status.settlement_rank()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

// ============================================================================
// INVESTMENT OFFER
// ============================================================================

/// Approval chain a co-investment offer passes before reaching the startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CoInvestmentApprovals {
    pub investor_advisor: ApprovalStatus,
    pub lead_investor: ApprovalStatus,
}

impl CoInvestmentApprovals {
    /// Both links satisfied: the startup may see and act on the offer.
    pub fn is_cleared(&self) -> bool {
        self.investor_advisor.is_satisfied() && self.lead_investor.is_satisfied()
    }

    /// Either link refused the offer.
    pub fn is_blocked(&self) -> bool {
        self.investor_advisor == ApprovalStatus::Rejected
            || self.lead_investor == ApprovalStatus::Rejected
    }
}

/// Which pipeline an offer belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OfferKind {
    #[default]
    Direct,
    CoInvestment {
        opportunity_id: CoInvestmentOpportunityId,
        approvals: CoInvestmentApprovals,
    },
}

/// Status derived from an offer's stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
}

/// An investment offer from an investor to a startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentOffer {
    pub id: OfferId,
    pub startup_id: StartupId,
    pub investor_id: UserId,
    pub offer_amount: f64,
    pub equity_percentage: f64,
    pub currency: String,
    pub stage: OfferStage,
    /// One-way latch, set when the offer reaches stage 4.
    #[serde(default)]
    pub contact_details_revealed: bool,
    #[serde(default)]
    pub kind: OfferKind,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
}

impl InvestmentOffer {
    pub fn status(&self) -> OfferStatus {
        match self.stage {
            OfferStage::Accepted => OfferStatus::Accepted,
            OfferStage::Rejected => OfferStatus::Rejected,
            _ => OfferStatus::Pending,
        }
    }

    pub fn is_co_investment(&self) -> bool {
        matches!(self.kind, OfferKind::CoInvestment { .. })
    }

    pub fn approvals(&self) -> Option<&CoInvestmentApprovals> {
        match &self.kind {
            OfferKind::Direct => None,
            OfferKind::CoInvestment { approvals, .. } => Some(approvals),
        }
    }

    /// The startup can see the offer and decide on it.
    pub fn surfaced_to_startup(&self) -> bool {
        let staged = matches!(self.stage, OfferStage::ReadyForReview | OfferStage::Accepted);
        staged && self.approvals().map_or(true, CoInvestmentApprovals::is_cleared)
    }

    /// Contact details may be shown to either party.
    pub fn contact_details_visible(&self) -> bool {
        self.contact_details_revealed && self.stage == OfferStage::Accepted
    }
}

impl Reconcilable for InvestmentOffer {
    type Id = OfferId;

    fn entity_kind(&self) -> EntityKind {
        match self.kind {
            OfferKind::Direct => EntityKind::InvestmentOffer,
            OfferKind::CoInvestment { .. } => EntityKind::CoInvestmentOffer,
        }
    }

    fn id(&self) -> &OfferId {
        &self.id
    }

    fn server_timestamp(&self) -> Option<Timestamp> {
        self.updated_at
    }

    fn settlement_rank(&self) -> u8 {
        self.stage.settlement_rank()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

// ============================================================================
// RECOGNITION RECORD
// ============================================================================

/// Equity side of a recognition agreement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityTerms {
    pub equity_allocated: Option<f64>,
    pub shares: Option<u64>,
    pub price_per_share: Option<f64>,
}

impl EquityTerms {
    /// shares x price, when both are known.
    pub fn investment_value(&self) -> Option<f64> {
        match (self.shares, self.price_per_share) {
            (Some(shares), Some(price)) => Some(shares as f64 * price),
            _ => None,
        }
    }
}

/// Incubation fee/equity agreement between a facilitator and a startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionRecord {
    pub id: RecognitionId,
    pub startup_id: StartupId,
    pub facilitator_code: FacilitatorCode,
    pub fee_type: FeeType,
    pub fee_amount: Option<f64>,
    pub equity_allocated: Option<f64>,
    pub shares: Option<u64>,
    pub price_per_share: Option<f64>,
    #[serde(default)]
    pub status: RecognitionStatus,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
}

impl RecognitionRecord {
    /// Equity terms, only for Equity and Hybrid agreements.
    pub fn equity_terms(&self) -> Option<EquityTerms> {
        if !self.fee_type.involves_equity() {
            return None;
        }
        Some(EquityTerms {
            equity_allocated: self.equity_allocated,
            shares: self.shares,
            price_per_share: self.price_per_share,
        })
    }

    /// Check the fee-type constraints on the optional columns.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let has_equity_columns = self.equity_allocated.is_some()
            || self.shares.is_some()
            || self.price_per_share.is_some();
        if has_equity_columns && !self.fee_type.involves_equity() {
            return Err(ValidationError::ConstraintViolation {
                constraint: "fee_type_equity_columns".to_string(),
                reason: format!("{} agreements carry no equity terms", self.fee_type),
            });
        }
        if let Some(equity) = self.equity_allocated {
            if !(0.0..=100.0).contains(&equity) {
                return Err(ValidationError::InvalidValue {
                    field: "equity_allocated".to_string(),
                    reason: "must be between 0 and 100".to_string(),
                });
            }
        }
        if self.price_per_share.is_some_and(|price| price < 0.0) {
            return Err(ValidationError::InvalidValue {
                field: "price_per_share".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        if self.fee_amount.is_some_and(|fee| fee < 0.0) {
            return Err(ValidationError::InvalidValue {
                field: "fee_amount".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }
}

impl Reconcilable for RecognitionRecord {
    type Id = RecognitionId;

    fn entity_kind(&self) -> EntityKind {
        EntityKind::RecognitionRecord
    }

    fn id(&self) -> &RecognitionId {
        &self.id
    }

    fn server_timestamp(&self) -> Option<Timestamp> {
        self.updated_at
    }

    fn settlement_rank(&self) -> u8 {
        self.status.settlement_rank()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

// ============================================================================
// STARTUP INVITATION
// ============================================================================

/// Facilitator-initiated invitation for a startup to join the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupInvitation {
    pub id: InvitationId,
    pub facilitator_id: UserId,
    pub startup_name: String,
    pub contact_email: String,
    #[serde(default)]
    pub status: InvitationStatus,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
}

/// Insert payload for a new invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvitation {
    pub facilitator_id: UserId,
    pub startup_name: String,
    pub contact_email: String,
}

impl NewInvitation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.startup_name.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "startup_name".to_string(),
            });
        }
        let email = self.contact_email.trim();
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !well_formed {
            return Err(ValidationError::InvalidValue {
                field: "contact_email".to_string(),
                reason: format!("'{}' is not an email address", self.contact_email),
            });
        }
        Ok(())
    }
}

impl Reconcilable for StartupInvitation {
    type Id = InvitationId;

    fn entity_kind(&self) -> EntityKind {
        EntityKind::StartupInvitation
    }

    fn id(&self) -> &InvitationId {
        &self.id
    }

    fn server_timestamp(&self) -> Option<Timestamp> {
        self.updated_at
    }

    fn settlement_rank(&self) -> u8 {
        self.status.settlement_rank()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

// ============================================================================
// MESSAGE
// ============================================================================

/// Local delivery state of a message. Never sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Delivery {
    /// Inserted locally, server echo not yet seen.
    Optimistic,
    #[default]
    Confirmed,
}

/// Message on an application thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub application_id: ApplicationId,
    pub sender_id: UserId,
    pub text: String,
    pub sent_at: Timestamp,
    #[serde(skip)]
    pub delivery: Delivery,
}

impl Message {
    /// Build the optimistic copy shown before the server confirms the insert.
    pub fn optimistic(
        application_id: ApplicationId,
        sender_id: UserId,
        text: impl Into<String>,
        sent_at: Timestamp,
    ) -> Self {
        Self {
            id: MessageId::local(),
            application_id,
            sender_id,
            text: text.into(),
            sent_at,
            delivery: Delivery::Optimistic,
        }
    }

    pub fn is_optimistic(&self) -> bool {
        self.delivery == Delivery::Optimistic
    }
}

/// Insert payload for a new message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub application_id: ApplicationId,
    pub sender_id: UserId,
    pub text: String,
}

impl Reconcilable for Message {
    type Id = MessageId;

    fn entity_kind(&self) -> EntityKind {
        EntityKind::Message
    }

    fn id(&self) -> &MessageId {
        &self.id
    }

    fn server_timestamp(&self) -> Option<Timestamp> {
        match self.delivery {
            Delivery::Confirmed => Some(self.sent_at),
            Delivery::Optimistic => None,
        }
    }

    fn settlement_rank(&self) -> u8 {
        match self.delivery {
            Delivery::Optimistic => 0,
            Delivery::Confirmed => 1,
        }
    }

    fn created_at(&self) -> Timestamp {
        self.sent_at
    }
}

// ============================================================================
// ANY RECORD
// ============================================================================

/// A record of any kind, for boundaries that handle every table.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyRecord {
    Application(Application),
    Offer(InvestmentOffer),
    Recognition(RecognitionRecord),
    Invitation(StartupInvitation),
    Message(Message),
}

impl AnyRecord {
    /// Decode a raw backend row of the given kind.
    pub fn decode(kind: EntityKind, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            EntityKind::Application => AnyRecord::Application(serde_json::from_value(value)?),
            EntityKind::InvestmentOffer | EntityKind::CoInvestmentOffer => {
                AnyRecord::Offer(serde_json::from_value(value)?)
            }
            EntityKind::RecognitionRecord => AnyRecord::Recognition(serde_json::from_value(value)?),
            EntityKind::StartupInvitation => AnyRecord::Invitation(serde_json::from_value(value)?),
            EntityKind::Message => AnyRecord::Message(serde_json::from_value(value)?),
        })
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self {
            AnyRecord::Application(r) => r.entity_kind(),
            AnyRecord::Offer(r) => r.entity_kind(),
            AnyRecord::Recognition(r) => r.entity_kind(),
            AnyRecord::Invitation(r) => r.entity_kind(),
            AnyRecord::Message(r) => r.entity_kind(),
        }
    }

    pub fn id_str(&self) -> &str {
        match self {
            AnyRecord::Application(r) => r.id.as_str(),
            AnyRecord::Offer(r) => r.id.as_str(),
            AnyRecord::Recognition(r) => r.id.as_str(),
            AnyRecord::Invitation(r) => r.id.as_str(),
            AnyRecord::Message(r) => r.id.as_str(),
        }
    }
}

impl From<Application> for AnyRecord {
    fn from(record: Application) -> Self {
        AnyRecord::Application(record)
    }
}

impl From<InvestmentOffer> for AnyRecord {
    fn from(record: InvestmentOffer) -> Self {
        AnyRecord::Offer(record)
    }
}

impl From<RecognitionRecord> for AnyRecord {
    fn from(record: RecognitionRecord) -> Self {
        AnyRecord::Recognition(record)
    }
}

impl From<StartupInvitation> for AnyRecord {
    fn from(record: StartupInvitation) -> Self {
        AnyRecord::Invitation(record)
    }
}

impl From<Message> for AnyRecord {
    fn from(record: Message) -> Self {
        AnyRecord::Message(record)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn recognition(fee_type: FeeType) -> RecognitionRecord {
        RecognitionRecord {
            id: RecognitionId::new("rec-1"),
            startup_id: StartupId::new("s-1"),
            facilitator_code: FacilitatorCode::new("FAC-1"),
            fee_type,
            fee_amount: None,
            equity_allocated: None,
            shares: None,
            price_per_share: None,
            status: RecognitionStatus::Pending,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn offer(stage: OfferStage, kind: OfferKind) -> InvestmentOffer {
        InvestmentOffer {
            id: OfferId::new("o-1"),
            startup_id: StartupId::new("s-1"),
            investor_id: UserId::new("inv-1"),
            offer_amount: 250_000.0,
            equity_percentage: 5.0,
            currency: "USD".to_string(),
            stage,
            contact_details_revealed: false,
            kind,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_application_decodes_backend_row_with_defaults() {
        let row = json!({
            "id": "app-1",
            "startup_id": "s-1",
            "opportunity_id": "opp-1",
            "created_at": "2025-03-01T10:00:00Z"
        });
        let app: Application = serde_json::from_value(row).unwrap();
        assert_eq!(app.status, ApplicationStatus::Pending);
        assert_eq!(app.diligence_status, DiligenceStatus::None);
        assert!(app.agreement_url.is_none());
        assert!(app.updated_at.is_none());
        assert!(app.diligence_actions_enabled());
    }

    #[test]
    fn test_diligence_breaks_settlement_ties_within_status() {
        let row = json!({
            "id": "app-1",
            "startup_id": "s-1",
            "opportunity_id": "opp-1",
            "created_at": "2025-03-01T10:00:00Z"
        });
        let mut untouched: Application = serde_json::from_value(row).unwrap();
        let mut requested = untouched.clone();
        requested.diligence_status = DiligenceStatus::Requested;
        assert!(requested.settlement_rank() > untouched.settlement_rank());

        untouched.status = ApplicationStatus::Accepted;
        requested.diligence_status = DiligenceStatus::Approved;
        assert!(untouched.settlement_rank() > requested.settlement_rank());
    }

    #[test]
    fn test_offer_decodes_numeric_stage() {
        let mut row = serde_json::to_value(offer(OfferStage::InvestorAdvisorReview, OfferKind::Direct)).unwrap();
        row["stage"] = json!(3);
        let decoded: InvestmentOffer = serde_json::from_value(row.clone()).unwrap();
        assert_eq!(decoded.stage, OfferStage::ReadyForReview);

        row["stage"] = json!("2");
        let decoded: InvestmentOffer = serde_json::from_value(row.clone()).unwrap();
        assert_eq!(decoded.stage, OfferStage::StartupAdvisorReview);

        row["stage"] = json!(9);
        assert!(serde_json::from_value::<InvestmentOffer>(row).is_err());
    }

    #[test]
    fn test_equity_terms_hidden_for_fee_only_agreements() {
        let mut record = recognition(FeeType::Fees);
        record.shares = Some(1_000);
        assert!(record.equity_terms().is_none());
        assert!(matches!(
            record.validate(),
            Err(ValidationError::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn test_equity_terms_for_hybrid_agreements() {
        let mut record = recognition(FeeType::Hybrid);
        record.shares = Some(1_000);
        record.price_per_share = Some(2.5);
        record.equity_allocated = Some(3.0);
        let terms = record.equity_terms().unwrap();
        assert_eq!(terms.investment_value(), Some(2_500.0));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_equity_out_of_range_is_invalid() {
        let mut record = recognition(FeeType::Equity);
        record.equity_allocated = Some(140.0);
        assert!(matches!(
            record.validate(),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_offer_status_derived_from_stage() {
        assert_eq!(offer(OfferStage::StartupAdvisorReview, OfferKind::Direct).status(), OfferStatus::Pending);
        assert_eq!(offer(OfferStage::Accepted, OfferKind::Direct).status(), OfferStatus::Accepted);
        assert_eq!(offer(OfferStage::Rejected, OfferKind::Direct).status(), OfferStatus::Rejected);
    }

    #[test]
    fn test_co_investment_hidden_until_cleared() {
        let kind = OfferKind::CoInvestment {
            opportunity_id: CoInvestmentOpportunityId::new("co-1"),
            approvals: CoInvestmentApprovals {
                investor_advisor: ApprovalStatus::Approved,
                lead_investor: ApprovalStatus::Pending,
            },
        };
        let pending = offer(OfferStage::ReadyForReview, kind);
        assert!(!pending.surfaced_to_startup());
        assert_eq!(pending.entity_kind(), EntityKind::CoInvestmentOffer);

        let cleared_kind = OfferKind::CoInvestment {
            opportunity_id: CoInvestmentOpportunityId::new("co-1"),
            approvals: CoInvestmentApprovals {
                investor_advisor: ApprovalStatus::NotRequired,
                lead_investor: ApprovalStatus::Approved,
            },
        };
        assert!(offer(OfferStage::ReadyForReview, cleared_kind).surfaced_to_startup());
    }

    #[test]
    fn test_direct_offer_surfaces_at_stage_three() {
        assert!(!offer(OfferStage::StartupAdvisorReview, OfferKind::Direct).surfaced_to_startup());
        assert!(offer(OfferStage::ReadyForReview, OfferKind::Direct).surfaced_to_startup());
    }

    #[test]
    fn test_offer_kind_serializes_tagged() {
        let kind = OfferKind::CoInvestment {
            opportunity_id: CoInvestmentOpportunityId::new("co-9"),
            approvals: CoInvestmentApprovals::default(),
        };
        let value = serde_json::to_value(&kind).unwrap();
        assert_eq!(value["type"], "co_investment");
        assert_eq!(value["opportunity_id"], "co-9");
        assert_eq!(serde_json::to_value(OfferKind::Direct).unwrap()["type"], "direct");
    }

    #[test]
    fn test_new_invitation_validation() {
        let mut invite = NewInvitation {
            facilitator_id: UserId::new("f-1"),
            startup_name: "Acme Robotics".to_string(),
            contact_email: "founder@acme.io".to_string(),
        };
        assert!(invite.validate().is_ok());
        invite.contact_email = "founder-at-acme".to_string();
        assert!(invite.validate().is_err());
        invite.contact_email = "founder@acme.io".to_string();
        invite.startup_name = "  ".to_string();
        assert!(matches!(
            invite.validate(),
            Err(ValidationError::RequiredFieldMissing { .. })
        ));
    }

    #[test]
    fn test_server_message_decodes_as_confirmed() {
        let row = json!({
            "id": "m-1",
            "application_id": "app-1",
            "sender_id": "u-1",
            "text": "Welcome aboard",
            "sent_at": "2025-03-01T10:00:00Z"
        });
        let message: Message = serde_json::from_value(row).unwrap();
        assert_eq!(message.delivery, Delivery::Confirmed);
        assert!(message.server_timestamp().is_some());
    }

    #[test]
    fn test_any_record_decode_routes_by_kind() {
        let row = serde_json::to_value(recognition(FeeType::Free)).unwrap();
        let record = AnyRecord::decode(EntityKind::RecognitionRecord, row).unwrap();
        assert_eq!(record.entity_kind(), EntityKind::RecognitionRecord);
        assert_eq!(record.id_str(), "rec-1");
    }
}
