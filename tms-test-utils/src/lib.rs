//! TrackMyStartup Test Utilities
//!
//! Centralized test infrastructure for the workspace:
//! - Proptest generators for statuses and records
//! - Fixtures for the usual records and principals
//! - Assertions on lifecycle results

// Re-export the in-memory backend from its source crate
pub use tms_gateway::{GatewayCall, MockChangeFeed, MockGateway};

pub use tms_core::{
    Application, ApplicationId, ApplicationStatus, ApprovalStatus, CoInvestmentApprovals,
    CoInvestmentOpportunityId, Delivery, DiligenceStatus, EntityKind, FacilitatorCode, FeeType,
    InvestmentOffer, InvitationId, InvitationStatus, LifecycleError, LifecycleResult, Message,
    MessageId, OfferId, OfferKind, OfferStage, OpportunityId, Principal, RecognitionId,
    RecognitionRecord, RecognitionStatus, RecordIdType, Role, StartupId, StartupInvitation,
    Timestamp, UserId,
};

use chrono::{DateTime, Utc};

/// 2025-03-01T00:00:00Z, the base of every fixture clock.
pub const BASE_EPOCH_SECS: i64 = 1_740_787_200;

/// Fixture clock: base time plus `offset_secs`.
pub fn ts(offset_secs: i64) -> Timestamp {
    DateTime::from_timestamp(BASE_EPOCH_SECS + offset_secs, 0).unwrap_or_else(Utc::now)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating records.

    use super::*;
    use proptest::prelude::*;

    /// Timestamps within a day of the fixture base.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (0i64..86_400).prop_map(ts)
    }

    pub fn arb_opt_timestamp() -> impl Strategy<Value = Option<Timestamp>> {
        proptest::option::of(arb_timestamp())
    }

    // === Status Generators ===

    pub fn arb_application_status() -> impl Strategy<Value = ApplicationStatus> {
        prop_oneof![
            Just(ApplicationStatus::Pending),
            Just(ApplicationStatus::Accepted),
            Just(ApplicationStatus::Rejected),
            Just(ApplicationStatus::Withdrawn),
        ]
    }

    pub fn arb_diligence_status() -> impl Strategy<Value = DiligenceStatus> {
        prop_oneof![
            Just(DiligenceStatus::None),
            Just(DiligenceStatus::Requested),
            Just(DiligenceStatus::Approved),
            Just(DiligenceStatus::Rejected),
        ]
    }

    pub fn arb_offer_stage() -> impl Strategy<Value = OfferStage> {
        prop_oneof![
            Just(OfferStage::InvestorAdvisorReview),
            Just(OfferStage::StartupAdvisorReview),
            Just(OfferStage::ReadyForReview),
            Just(OfferStage::Accepted),
            Just(OfferStage::Rejected),
        ]
    }

    pub fn arb_approval_status() -> impl Strategy<Value = ApprovalStatus> {
        prop_oneof![
            Just(ApprovalStatus::NotRequired),
            Just(ApprovalStatus::Pending),
            Just(ApprovalStatus::Approved),
            Just(ApprovalStatus::Rejected),
        ]
    }

    pub fn arb_recognition_status() -> impl Strategy<Value = RecognitionStatus> {
        prop_oneof![Just(RecognitionStatus::Pending), Just(RecognitionStatus::Approved)]
    }

    pub fn arb_invitation_status() -> impl Strategy<Value = InvitationStatus> {
        prop_oneof![
            Just(InvitationStatus::Pending),
            Just(InvitationStatus::Sent),
            Just(InvitationStatus::Accepted),
            Just(InvitationStatus::Declined),
        ]
    }

    pub fn arb_fee_type() -> impl Strategy<Value = FeeType> {
        prop_oneof![
            Just(FeeType::Free),
            Just(FeeType::Fees),
            Just(FeeType::Equity),
            Just(FeeType::Hybrid),
        ]
    }

    pub fn arb_entity_kind() -> impl Strategy<Value = EntityKind> {
        proptest::sample::select(EntityKind::ALL.to_vec())
    }

    // === Record Generators ===

    /// Application with the given id and arbitrary status, opportunity and times.
    pub fn arb_application_with_id(id: String) -> impl Strategy<Value = Application> {
        (
            arb_application_status(),
            arb_diligence_status(),
            0u8..4,
            arb_timestamp(),
            arb_opt_timestamp(),
        )
            .prop_map(move |(status, diligence_status, opp, created_at, updated_at)| Application {
                id: ApplicationId::new(id.clone()),
                startup_id: StartupId::new("startup-1"),
                opportunity_id: OpportunityId::new(format!("opp-{}", opp)),
                status,
                diligence_status,
                agreement_url: None,
                contract_url: None,
                created_at,
                updated_at,
            })
    }

    /// Applications with distinct ids.
    pub fn arb_applications(max: usize) -> impl Strategy<Value = Vec<Application>> {
        (0..=max).prop_flat_map(|n| {
            (0..n)
                .map(|i| arb_application_with_id(format!("app-{}", i)))
                .collect::<Vec<_>>()
        })
    }

    /// Several versions of one application, as a feed might deliver them.
    pub fn arb_application_versions(max: usize) -> impl Strategy<Value = Vec<Application>> {
        proptest::collection::vec(arb_application_with_id("app-0".to_string()), 1..=max)
    }

    pub fn arb_offer_with_id(id: String) -> impl Strategy<Value = InvestmentOffer> {
        (
            arb_offer_stage(),
            proptest::option::of((arb_approval_status(), arb_approval_status())),
            1_000u32..5_000_000,
            arb_timestamp(),
            arb_opt_timestamp(),
        )
            .prop_map(move |(stage, approvals, amount, created_at, updated_at)| {
                let kind = match approvals {
                    None => OfferKind::Direct,
                    Some((investor_advisor, lead_investor)) => OfferKind::CoInvestment {
                        opportunity_id: CoInvestmentOpportunityId::new("co-opp-1"),
                        approvals: CoInvestmentApprovals {
                            investor_advisor,
                            lead_investor,
                        },
                    },
                };
                InvestmentOffer {
                    id: OfferId::new(id.clone()),
                    startup_id: StartupId::new("startup-1"),
                    investor_id: UserId::new("investor-1"),
                    offer_amount: f64::from(amount),
                    equity_percentage: 5.0,
                    currency: "USD".to_string(),
                    stage,
                    contact_details_revealed: stage == OfferStage::Accepted,
                    kind,
                    created_at,
                    updated_at,
                }
            })
    }

    pub fn arb_offers(max: usize) -> impl Strategy<Value = Vec<InvestmentOffer>> {
        (0..=max).prop_flat_map(|n| {
            (0..n)
                .map(|i| arb_offer_with_id(format!("offer-{}", i)))
                .collect::<Vec<_>>()
        })
    }

    /// Recognition record whose optional columns respect its fee type.
    pub fn arb_recognition_with_id(id: String) -> impl Strategy<Value = RecognitionRecord> {
        (
            arb_fee_type(),
            arb_recognition_status(),
            0u8..3,
            1u64..100_000,
            arb_timestamp(),
        )
            .prop_map(move |(fee_type, status, code, shares, created_at)| {
                let equity = fee_type.involves_equity();
                RecognitionRecord {
                    id: RecognitionId::new(id.clone()),
                    startup_id: StartupId::new("startup-1"),
                    facilitator_code: FacilitatorCode::new(format!("FAC-00{}", code)),
                    fee_type,
                    fee_amount: matches!(fee_type, FeeType::Fees | FeeType::Hybrid).then_some(500.0),
                    equity_allocated: equity.then_some(2.5),
                    shares: equity.then_some(shares),
                    price_per_share: equity.then_some(1.25),
                    status,
                    created_at,
                    updated_at: None,
                }
            })
    }

    pub fn arb_recognitions(max: usize) -> impl Strategy<Value = Vec<RecognitionRecord>> {
        (0..=max).prop_flat_map(|n| {
            (0..n)
                .map(|i| arb_recognition_with_id(format!("rec-{}", i)))
                .collect::<Vec<_>>()
        })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and principals for common scenarios.

    use super::*;

    pub const STARTUP_ID: &str = "startup-1";
    pub const FACILITATOR_CODE: &str = "FAC-001";

    pub fn facilitator() -> Principal {
        Principal::facilitator(UserId::new("facilitator-1"), FacilitatorCode::new(FACILITATOR_CODE))
    }

    pub fn other_facilitator() -> Principal {
        Principal::facilitator(UserId::new("facilitator-2"), FacilitatorCode::new("FAC-999"))
    }

    pub fn startup_owner() -> Principal {
        Principal::startup(UserId::new("founder-1"), StartupId::new(STARTUP_ID))
    }

    pub fn other_startup() -> Principal {
        Principal::startup(UserId::new("founder-2"), StartupId::new("startup-2"))
    }

    pub fn investor() -> Principal {
        Principal::with_role(UserId::new("investor-1"), Role::Investor)
    }

    pub fn investor_advisor() -> Principal {
        Principal::with_role(UserId::new("advisor-1"), Role::InvestorAdvisor)
    }

    pub fn startup_advisor() -> Principal {
        Principal::with_role(UserId::new("advisor-2"), Role::StartupAdvisor)
    }

    pub fn lead_investor() -> Principal {
        Principal::with_role(UserId::new("lead-1"), Role::LeadInvestor)
    }

    pub fn admin() -> Principal {
        Principal::with_role(UserId::new("admin-1"), Role::Admin)
    }

    pub fn application(id: &str, status: ApplicationStatus, diligence: DiligenceStatus) -> Application {
        Application {
            id: ApplicationId::new(id),
            startup_id: StartupId::new(STARTUP_ID),
            opportunity_id: OpportunityId::new("opp-1"),
            status,
            diligence_status: diligence,
            agreement_url: None,
            contract_url: None,
            created_at: ts(0),
            updated_at: Some(ts(0)),
        }
    }

    pub fn pending_application(id: &str) -> Application {
        application(id, ApplicationStatus::Pending, DiligenceStatus::None)
    }

    pub fn offer(id: &str, stage: OfferStage) -> InvestmentOffer {
        InvestmentOffer {
            id: OfferId::new(id),
            startup_id: StartupId::new(STARTUP_ID),
            investor_id: UserId::new("investor-1"),
            offer_amount: 250_000.0,
            equity_percentage: 8.0,
            currency: "USD".to_string(),
            stage,
            contact_details_revealed: stage == OfferStage::Accepted,
            kind: OfferKind::Direct,
            created_at: ts(0),
            updated_at: Some(ts(0)),
        }
    }

    pub fn co_investment_offer(
        id: &str,
        stage: OfferStage,
        investor_advisor: ApprovalStatus,
        lead_investor: ApprovalStatus,
    ) -> InvestmentOffer {
        InvestmentOffer {
            kind: OfferKind::CoInvestment {
                opportunity_id: CoInvestmentOpportunityId::new("co-opp-1"),
                approvals: CoInvestmentApprovals {
                    investor_advisor,
                    lead_investor,
                },
            },
            ..offer(id, stage)
        }
    }

    pub fn recognition_record(id: &str, fee_type: FeeType, status: RecognitionStatus) -> RecognitionRecord {
        let equity = fee_type.involves_equity();
        RecognitionRecord {
            id: RecognitionId::new(id),
            startup_id: StartupId::new(STARTUP_ID),
            facilitator_code: FacilitatorCode::new(FACILITATOR_CODE),
            fee_type,
            fee_amount: matches!(fee_type, FeeType::Fees | FeeType::Hybrid).then_some(1_000.0),
            equity_allocated: equity.then_some(3.0),
            shares: equity.then_some(10_000),
            price_per_share: equity.then_some(0.5),
            status,
            created_at: ts(0),
            updated_at: Some(ts(0)),
        }
    }

    pub fn invitation(id: &str, status: InvitationStatus) -> StartupInvitation {
        StartupInvitation {
            id: InvitationId::new(id),
            facilitator_id: UserId::new("facilitator-1"),
            startup_name: "Acme Robotics".to_string(),
            contact_email: "founder@acme.io".to_string(),
            status,
            created_at: ts(0),
            updated_at: Some(ts(0)),
        }
    }

    /// Confirmed message on application `app-1`.
    pub fn message(id: &str, sender: &str, text: &str, sent_at: Timestamp) -> Message {
        Message {
            id: MessageId::new(id),
            application_id: ApplicationId::new("app-1"),
            sender_id: UserId::new(sender),
            text: text.to_string(),
            sent_at,
            delivery: Delivery::Confirmed,
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on lifecycle results.

    use super::*;

    pub fn assert_invalid_transition<T: std::fmt::Debug>(result: &LifecycleResult<T>) {
        assert!(
            matches!(result, Err(LifecycleError::InvalidTransition { .. })),
            "expected InvalidTransition, got {:?}",
            result
        );
    }

    pub fn assert_forbidden<T: std::fmt::Debug>(result: &LifecycleResult<T>) {
        assert!(
            matches!(result, Err(LifecycleError::Forbidden { .. })),
            "expected Forbidden, got {:?}",
            result
        );
    }

    pub fn assert_in_flight<T: std::fmt::Debug>(result: &LifecycleResult<T>) {
        assert!(
            matches!(result, Err(LifecycleError::ActionInFlight { .. })),
            "expected ActionInFlight, got {:?}",
            result
        );
    }

    pub fn assert_gateway_error<T: std::fmt::Debug>(result: &LifecycleResult<T>) {
        assert!(
            matches!(result, Err(LifecycleError::Gateway(_))),
            "expected Gateway error, got {:?}",
            result
        );
    }

    pub fn assert_conflict<T: std::fmt::Debug>(result: &LifecycleResult<T>) {
        assert!(
            matches!(result, Err(LifecycleError::Conflict { .. })),
            "expected Conflict, got {:?}",
            result
        );
    }

    /// No mutating call reached the backend.
    pub fn assert_no_mutations(gateway: &MockGateway) {
        assert_eq!(
            gateway.mutation_count(),
            0,
            "expected no gateway mutations, got {:?}",
            gateway.calls()
        );
    }
}
