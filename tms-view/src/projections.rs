//! Per-dashboard list projections.

use crate::ordering::newest_first;
use crate::show_more::ShowMore;
use serde::{Deserialize, Serialize};
use tms_core::{
    ApprovalStatus, InvestmentOffer, OfferStage, Principal, RecognitionRecord, Role, StartupId,
    StartupInvitation, StatusMachine,
};

/// A paged slice of a projected list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub items: Vec<&'a T>,
    /// Items behind the "show more" control.
    pub hidden: usize,
}

impl<'a, T> Page<'a, T> {
    pub fn new(ordered: Vec<&'a T>, paging: &ShowMore) -> Self {
        let hidden = paging.hidden_count(ordered.len());
        let items = paging.visible(&ordered).to_vec();
        Self { items, hidden }
    }
}

/// Offers the startup may see: direct offers from stage 3 on and
/// co-investment offers whose approval chain has cleared. Newest first.
pub fn startup_offers<'a, I>(offers: I, startup_id: &StartupId) -> Vec<&'a InvestmentOffer>
where
    I: IntoIterator<Item = &'a InvestmentOffer>,
{
    newest_first(
        offers
            .into_iter()
            .filter(|offer| &offer.startup_id == startup_id && offer.surfaced_to_startup()),
    )
}

/// Offers waiting on the principal's decision.
pub fn review_queue<'a, I>(offers: I, principal: &Principal) -> Vec<&'a InvestmentOffer>
where
    I: IntoIterator<Item = &'a InvestmentOffer>,
{
    newest_first(offers.into_iter().filter(|offer| awaits(offer, principal)))
}

fn awaits(offer: &InvestmentOffer, principal: &Principal) -> bool {
    let approvals = offer.approvals();
    match principal.role {
        Role::InvestorAdvisor => {
            offer.stage == OfferStage::InvestorAdvisorReview
                || (!offer.stage.is_terminal()
                    && approvals.is_some_and(|a| a.investor_advisor == ApprovalStatus::Pending))
        }
        Role::StartupAdvisor => offer.stage == OfferStage::StartupAdvisorReview,
        Role::LeadInvestor => {
            !offer.stage.is_terminal()
                && approvals.is_some_and(|a| {
                    a.investor_advisor.is_satisfied() && a.lead_investor == ApprovalStatus::Pending
                })
        }
        Role::Startup => principal.owns_startup(&offer.startup_id)
            && offer.stage == OfferStage::ReadyForReview
            && offer.surfaced_to_startup(),
        Role::Investor => offer.investor_id == principal.user_id && !offer.stage.is_terminal(),
        Role::Facilitator | Role::Admin => false,
    }
}

/// Counterparty contact details shown on an offer card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Contact details, only once the offer is accepted and revealed.
pub fn visible_contact<'a>(
    offer: &InvestmentOffer,
    details: &'a ContactDetails,
) -> Option<&'a ContactDetails> {
    offer.contact_details_visible().then_some(details)
}

pub fn recognition_page<'a, I>(records: I, paging: &ShowMore) -> Page<'a, RecognitionRecord>
where
    I: IntoIterator<Item = &'a RecognitionRecord>,
{
    Page::new(newest_first(records), paging)
}

pub fn invitation_page<'a, I>(invitations: I, paging: &ShowMore) -> Page<'a, StartupInvitation>
where
    I: IntoIterator<Item = &'a StartupInvitation>,
{
    Page::new(newest_first(invitations), paging)
}
