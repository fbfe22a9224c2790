//! Names of the server procedures the dashboard invokes.
//!
//! Arguments are JSON objects. Offer procedures take `offer_id`; application
//! procedures take `application_id`; recognition takes `record_id`.

pub const APPROVE_DILIGENCE_REQUEST: &str = "approve_diligence_request";
pub const REJECT_DILIGENCE_REQUEST: &str = "reject_diligence_request";

pub const ACCEPT_INVESTMENT_OFFER: &str = "accept_investment_offer";
pub const REJECT_INVESTMENT_OFFER: &str = "reject_investment_offer";
pub const ACCEPT_CO_INVESTMENT_OFFER: &str = "accept_co_investment_offer";
pub const REJECT_CO_INVESTMENT_OFFER: &str = "reject_co_investment_offer";

/// Advisor approval moving an offer one stage forward. Takes `offer_id` and `table`.
pub const ADVANCE_OFFER_STAGE: &str = "advance_offer_stage";

/// Co-investment approval chain. Takes `offer_id` and `approver`
/// (`investor_advisor` or `lead_investor`).
pub const APPROVE_CO_INVESTMENT: &str = "approve_co_investment";
pub const REJECT_CO_INVESTMENT: &str = "reject_co_investment";

pub const APPROVE_RECOGNITION_RECORD: &str = "approve_recognition_record";

pub const ALL: &[&str] = &[
    APPROVE_DILIGENCE_REQUEST,
    REJECT_DILIGENCE_REQUEST,
    ACCEPT_INVESTMENT_OFFER,
    REJECT_INVESTMENT_OFFER,
    ACCEPT_CO_INVESTMENT_OFFER,
    REJECT_CO_INVESTMENT_OFFER,
    ADVANCE_OFFER_STAGE,
    APPROVE_CO_INVESTMENT,
    REJECT_CO_INVESTMENT,
    APPROVE_RECOGNITION_RECORD,
];
