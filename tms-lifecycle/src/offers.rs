//! Investment offer pipeline: advisor stages, co-investment approvals and
//! the startup's final decision.
//!
//! Direct and co-investment offers share the stage machine but live in
//! different tables and use different procedures; every operation here
//! dispatches on [`OfferKind`].

use crate::reconciler::{authorize, ensure_transition, invalid_transition, Mutation, Reconciler};
use serde_json::json;
use tms_core::{
    ApprovalStatus, CoInvestmentApprovals, InvestmentOffer, LifecycleAction, LifecycleError,
    LifecycleResult, OfferKind, OfferStage, Principal, Reconcilable, RecordIdType, Role,
    StatusMachine, ValidationError,
};
use tms_gateway::{procedures, MutationGateway};

/// A link in the co-investment approval chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approver {
    InvestorAdvisor,
    LeadInvestor,
}

impl Approver {
    /// Argument value the approval procedures expect.
    pub fn as_arg(&self) -> &'static str {
        match self {
            Approver::InvestorAdvisor => "investor_advisor",
            Approver::LeadInvestor => "lead_investor",
        }
    }

    fn status(&self, approvals: &CoInvestmentApprovals) -> ApprovalStatus {
        match self {
            Approver::InvestorAdvisor => approvals.investor_advisor,
            Approver::LeadInvestor => approvals.lead_investor,
        }
    }
}

fn accept_procedure(offer: &InvestmentOffer) -> &'static str {
    match offer.kind {
        OfferKind::Direct => procedures::ACCEPT_INVESTMENT_OFFER,
        OfferKind::CoInvestment { .. } => procedures::ACCEPT_CO_INVESTMENT_OFFER,
    }
}

fn reject_procedure(offer: &InvestmentOffer) -> &'static str {
    match offer.kind {
        OfferKind::Direct => procedures::REJECT_INVESTMENT_OFFER,
        OfferKind::CoInvestment { .. } => procedures::REJECT_CO_INVESTMENT_OFFER,
    }
}

/// Who decides an offer at its current stage.
fn may_decide(principal: &Principal, offer: &InvestmentOffer) -> bool {
    match offer.stage {
        OfferStage::InvestorAdvisorReview => principal.acts_as(Role::InvestorAdvisor),
        OfferStage::StartupAdvisorReview => principal.acts_as(Role::StartupAdvisor),
        OfferStage::ReadyForReview | OfferStage::Accepted | OfferStage::Rejected => {
            principal.owns_startup(&offer.startup_id)
        }
    }
}

/// Contact details once revealed stay revealed.
fn latch_contact_details(previous: &InvestmentOffer, returned: &mut InvestmentOffer) {
    let revealed = previous.contact_details_revealed || returned.stage == OfferStage::Accepted;
    if revealed && !returned.contact_details_revealed {
        tracing::debug!(id = %returned.id, "Re-latching revealed contact details");
        returned.contact_details_revealed = true;
    }
}

impl<G: MutationGateway> Reconciler<G> {
    /// Startup accepts an offer at stage 3, moving it to stage 4 and
    /// revealing contact details to both parties.
    pub async fn accept_investment_offer(
        &self,
        principal: &Principal,
        offer: &InvestmentOffer,
    ) -> LifecycleResult<InvestmentOffer> {
        let action = LifecycleAction::AcceptOffer;
        authorize(
            principal,
            action,
            principal.owns_startup(&offer.startup_id),
            "only the receiving startup can accept an offer",
        )?;
        let entity = offer.entity_kind();
        let id = offer.id.as_str();
        ensure_transition(entity, id, offer.stage, OfferStage::Accepted, action)?;
        if !offer.surfaced_to_startup() {
            return Err(invalid_transition(entity, id, "awaiting co-investment approval", action));
        }

        let _ticket = self.in_flight().acquire(entity, id)?;
        let mut accepted: InvestmentOffer = self
            .execute(
                action,
                entity,
                Some(id),
                Mutation::Procedure {
                    name: accept_procedure(offer),
                    args: json!({ "offer_id": id }),
                },
            )
            .await?;
        latch_contact_details(offer, &mut accepted);
        Ok(accepted)
    }

    /// Reject an offer at any non-terminal stage. The advisor of the current
    /// stage decides at stages 1 and 2, the startup at stage 3.
    pub async fn reject_investment_offer(
        &self,
        principal: &Principal,
        offer: &InvestmentOffer,
    ) -> LifecycleResult<InvestmentOffer> {
        let action = LifecycleAction::RejectOffer;
        authorize(
            principal,
            action,
            may_decide(principal, offer),
            "the offer is not at a stage this role decides",
        )?;
        let entity = offer.entity_kind();
        let id = offer.id.as_str();
        ensure_transition(entity, id, offer.stage, OfferStage::Rejected, action)?;
        if offer.stage == OfferStage::ReadyForReview && !offer.surfaced_to_startup() {
            return Err(invalid_transition(entity, id, "awaiting co-investment approval", action));
        }

        let _ticket = self.in_flight().acquire(entity, id)?;
        let mut rejected: InvestmentOffer = self
            .execute(
                action,
                entity,
                Some(id),
                Mutation::Procedure {
                    name: reject_procedure(offer),
                    args: json!({ "offer_id": id }),
                },
            )
            .await?;
        latch_contact_details(offer, &mut rejected);
        Ok(rejected)
    }

    /// Advisor approval: investor advisor moves 1 to 2, startup advisor 2 to 3.
    pub async fn advance_offer_stage(
        &self,
        principal: &Principal,
        offer: &InvestmentOffer,
    ) -> LifecycleResult<InvestmentOffer> {
        let action = LifecycleAction::AdvanceOfferStage;
        authorize(
            principal,
            action,
            may_decide(principal, offer),
            "the offer is not at a stage this role decides",
        )?;
        let entity = offer.entity_kind();
        let id = offer.id.as_str();
        let next = match offer.stage {
            OfferStage::InvestorAdvisorReview | OfferStage::StartupAdvisorReview => offer.stage.next(),
            _ => None,
        };
        let Some(next) = next else {
            return Err(invalid_transition(entity, id, offer.stage, action));
        };
        ensure_transition(entity, id, offer.stage, next, action)?;
        if offer.approvals().is_some_and(CoInvestmentApprovals::is_blocked) {
            return Err(invalid_transition(entity, id, "declined in co-investment review", action));
        }

        let _ticket = self.in_flight().acquire(entity, id)?;
        let mut advanced: InvestmentOffer = self
            .execute(
                action,
                entity,
                Some(id),
                Mutation::Procedure {
                    name: procedures::ADVANCE_OFFER_STAGE,
                    args: json!({ "offer_id": id, "table": entity.table() }),
                },
            )
            .await?;
        latch_contact_details(offer, &mut advanced);
        Ok(advanced)
    }

    /// Record the acting approver's consent on a co-investment offer.
    pub async fn approve_co_investment(
        &self,
        principal: &Principal,
        offer: &InvestmentOffer,
    ) -> LifecycleResult<InvestmentOffer> {
        self.decide_co_investment(
            principal,
            offer,
            ApprovalStatus::Approved,
            LifecycleAction::ApproveCoInvestment,
            procedures::APPROVE_CO_INVESTMENT,
        )
        .await
    }

    /// Decline a co-investment offer. The offer is rejected as a whole.
    pub async fn reject_co_investment(
        &self,
        principal: &Principal,
        offer: &InvestmentOffer,
    ) -> LifecycleResult<InvestmentOffer> {
        self.decide_co_investment(
            principal,
            offer,
            ApprovalStatus::Rejected,
            LifecycleAction::RejectCoInvestment,
            procedures::REJECT_CO_INVESTMENT,
        )
        .await
    }

    async fn decide_co_investment(
        &self,
        principal: &Principal,
        offer: &InvestmentOffer,
        decision: ApprovalStatus,
        action: LifecycleAction,
        procedure: &'static str,
    ) -> LifecycleResult<InvestmentOffer> {
        let Some(approvals) = offer.approvals().copied() else {
            return Err(ValidationError::ConstraintViolation {
                constraint: "co_investment_only".to_string(),
                reason: format!("offer {} is a direct offer", offer.id),
            }
            .into());
        };
        let approver = match principal.role {
            Role::InvestorAdvisor => Approver::InvestorAdvisor,
            Role::LeadInvestor => Approver::LeadInvestor,
            Role::Admin if approvals.investor_advisor == ApprovalStatus::Pending => {
                Approver::InvestorAdvisor
            }
            Role::Admin => Approver::LeadInvestor,
            _ => {
                return Err(LifecycleError::Forbidden {
                    action,
                    role: principal.role,
                    reason: "only advisors and lead investors decide co-investments".to_string(),
                })
            }
        };

        let entity = offer.entity_kind();
        let id = offer.id.as_str();
        if offer.stage.is_terminal() {
            return Err(invalid_transition(entity, id, offer.stage, action));
        }
        if approver == Approver::LeadInvestor && !approvals.investor_advisor.is_satisfied() {
            return Err(invalid_transition(entity, id, "awaiting investor advisor approval", action));
        }
        let current = approver.status(&approvals);
        if !current.can_transition_to(decision) {
            return Err(invalid_transition(
                entity,
                id,
                format!("{} approval {}", approver.as_arg().replace('_', " "), current),
                action,
            ));
        }

        let _ticket = self.in_flight().acquire(entity, id)?;
        let mut decided: InvestmentOffer = self
            .execute(
                action,
                entity,
                Some(id),
                Mutation::Procedure {
                    name: procedure,
                    args: json!({ "offer_id": id, "approver": approver.as_arg() }),
                },
            )
            .await?;
        latch_contact_details(offer, &mut decided);
        Ok(decided)
    }

    /// Hard-delete an offer that reached a terminal stage.
    pub async fn delete_investment_offer(
        &self,
        principal: &Principal,
        offer: &InvestmentOffer,
    ) -> LifecycleResult<()> {
        let action = LifecycleAction::DeleteOffer;
        let is_investor = principal.role == Role::Investor && principal.user_id == offer.investor_id;
        authorize(
            principal,
            action,
            is_investor || principal.owns_startup(&offer.startup_id),
            "only the offering investor or the receiving startup can delete an offer",
        )?;
        let entity = offer.entity_kind();
        let id = offer.id.as_str();
        if !offer.stage.is_terminal() {
            return Err(invalid_transition(entity, id, offer.stage, action));
        }

        let _ticket = self.in_flight().acquire(entity, id)?;
        if let Err(err) = self.gateway().delete_record(entity, id).await {
            return Err(self.gateway_failure(action, entity, Some(id), err).await);
        }
        tracing::info!(action = %action, entity = %entity, id, "Lifecycle action applied");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
