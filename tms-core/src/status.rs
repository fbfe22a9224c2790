//! Status model: one closed enum per lifecycle, each with its transition table.
//!
//! # Transition Tables
//!
//! ```text
//! Application      pending ──┬── accept ──→ accepted ──┐
//!                            ├── reject ──→ rejected ──┼── withdraw → withdrawn (terminal)
//!                            └── withdraw ─────────────┘
//!
//! Diligence        none → requested ──┬── approve → approved (terminal)
//!                    ↑                └── reject ──┐
//!                    └─────────────────────────────┘
//!
//! Offer stage      1 → 2 → 3 → 4 (accepted, terminal)
//!                  any non-terminal stage → rejected (terminal)
//!
//! Recognition      pending → approved (terminal, repeat approve is a no-op)
//!
//! Invitation       pending → sent ──┬── accepted (terminal)
//!                                   └── declined (terminal)
//!
//! Co-investment    pending ──┬── approved (terminal)
//! approval                   └── rejected (terminal)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A closed status type with a static transition table.
pub trait StatusMachine: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Human-readable name of the lifecycle, used in errors.
    const LIFECYCLE: &'static str;

    /// Every state of the lifecycle.
    const ALL: &'static [Self];

    /// States reachable in one step from `self`.
    fn allowed_transitions(&self) -> &'static [Self];

    /// How settled a state is. Higher ranks win merge ties.
    fn settlement_rank(&self) -> u8;

    /// Whether `next` is reachable in one step.
    fn can_transition_to(&self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// A state with no outgoing transitions.
    fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Error when parsing an unknown status string from the backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {lifecycle} status: {value}")]
pub struct StatusParseError {
    pub lifecycle: &'static str,
    pub value: String,
}

impl StatusParseError {
    fn new(lifecycle: &'static str, value: &str) -> Self {
        Self {
            lifecycle,
            value: value.to_string(),
        }
    }
}

// ============================================================================
// APPLICATION STATUS
// ============================================================================

/// Status of a startup application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    /// Soft delete. Rows are never hard-deleted.
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, StatusParseError> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ApplicationStatus::Pending),
            "accepted" => Ok(ApplicationStatus::Accepted),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "withdrawn" | "deleted" => Ok(ApplicationStatus::Withdrawn),
            _ => Err(StatusParseError::new(Self::LIFECYCLE, s)),
        }
    }
}

impl StatusMachine for ApplicationStatus {
    const LIFECYCLE: &'static str = "application";
    const ALL: &'static [Self] = &[
        ApplicationStatus::Pending,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    fn allowed_transitions(&self) -> &'static [Self] {
        match self {
            ApplicationStatus::Pending => &[
                ApplicationStatus::Accepted,
                ApplicationStatus::Rejected,
                ApplicationStatus::Withdrawn,
            ],
            ApplicationStatus::Accepted => &[ApplicationStatus::Withdrawn],
            ApplicationStatus::Rejected => &[ApplicationStatus::Withdrawn],
            ApplicationStatus::Withdrawn => &[],
        }
    }

    fn settlement_rank(&self) -> u8 {
        match self {
            ApplicationStatus::Pending => 0,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected => 1,
            ApplicationStatus::Withdrawn => 2,
        }
    }
}

// ============================================================================
// DILIGENCE STATUS
// ============================================================================

/// Due-diligence state of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiligenceStatus {
    #[default]
    None,
    Requested,
    Approved,
    /// Only seen on legacy rows; rejecting a request now resets to `None`.
    Rejected,
}

impl DiligenceStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            DiligenceStatus::None => "none",
            DiligenceStatus::Requested => "requested",
            DiligenceStatus::Approved => "approved",
            DiligenceStatus::Rejected => "rejected",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, StatusParseError> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(DiligenceStatus::None),
            "requested" => Ok(DiligenceStatus::Requested),
            "approved" => Ok(DiligenceStatus::Approved),
            "rejected" => Ok(DiligenceStatus::Rejected),
            _ => Err(StatusParseError::new(Self::LIFECYCLE, s)),
        }
    }
}

impl StatusMachine for DiligenceStatus {
    const LIFECYCLE: &'static str = "diligence";
    const ALL: &'static [Self] = &[
        DiligenceStatus::None,
        DiligenceStatus::Requested,
        DiligenceStatus::Approved,
        DiligenceStatus::Rejected,
    ];

    fn allowed_transitions(&self) -> &'static [Self] {
        match self {
            DiligenceStatus::None => &[DiligenceStatus::Requested],
            DiligenceStatus::Requested => &[DiligenceStatus::Approved, DiligenceStatus::None],
            DiligenceStatus::Approved => &[],
            DiligenceStatus::Rejected => &[DiligenceStatus::Requested],
        }
    }

    fn settlement_rank(&self) -> u8 {
        match self {
            DiligenceStatus::None | DiligenceStatus::Rejected => 0,
            DiligenceStatus::Requested => 1,
            DiligenceStatus::Approved => 2,
        }
    }
}

// ============================================================================
// OFFER STAGE
// ============================================================================

/// Position of an investment offer in the four-stage approval pipeline.
///
/// Decodes from the stage name or the backend's numeric stage (`3` or `"3"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStage {
    /// Stage 1: waiting on the investor's advisor.
    InvestorAdvisorReview,
    /// Stage 2: waiting on the startup's advisor.
    StartupAdvisorReview,
    /// Stage 3: visible to the startup for a decision.
    ReadyForReview,
    /// Stage 4: accepted by the startup.
    Accepted,
    /// Rejected at any stage.
    Rejected,
}

impl OfferStage {
    /// Numeric stage used by the backend (`None` once rejected).
    pub fn number(&self) -> Option<u8> {
        match self {
            OfferStage::InvestorAdvisorReview => Some(1),
            OfferStage::StartupAdvisorReview => Some(2),
            OfferStage::ReadyForReview => Some(3),
            OfferStage::Accepted => Some(4),
            OfferStage::Rejected => None,
        }
    }

    pub fn from_number(stage: u8) -> Option<Self> {
        match stage {
            1 => Some(OfferStage::InvestorAdvisorReview),
            2 => Some(OfferStage::StartupAdvisorReview),
            3 => Some(OfferStage::ReadyForReview),
            4 => Some(OfferStage::Accepted),
            _ => None,
        }
    }

    /// The next forward stage, if any.
    pub fn next(&self) -> Option<Self> {
        self.number().and_then(|n| Self::from_number(n + 1))
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            OfferStage::InvestorAdvisorReview => "investor_advisor_review",
            OfferStage::StartupAdvisorReview => "startup_advisor_review",
            OfferStage::ReadyForReview => "ready_for_review",
            OfferStage::Accepted => "accepted",
            OfferStage::Rejected => "rejected",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, StatusParseError> {
        let lowered = s.to_lowercase();
        if let Some(stage) = lowered.parse::<u8>().ok().and_then(Self::from_number) {
            return Ok(stage);
        }
        match lowered.as_str() {
            "investor_advisor_review" => Ok(OfferStage::InvestorAdvisorReview),
            "startup_advisor_review" => Ok(OfferStage::StartupAdvisorReview),
            "ready_for_review" => Ok(OfferStage::ReadyForReview),
            "accepted" => Ok(OfferStage::Accepted),
            "rejected" => Ok(OfferStage::Rejected),
            _ => Err(StatusParseError::new(Self::LIFECYCLE, s)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOfferStage {
    Number(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for OfferStage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match RawOfferStage::deserialize(deserializer)? {
            RawOfferStage::Number(n) => u8::try_from(n)
                .ok()
                .and_then(Self::from_number)
                .ok_or_else(|| {
                    serde::de::Error::custom(StatusParseError::new(Self::LIFECYCLE, &n.to_string()))
                }),
            RawOfferStage::Text(text) => Self::from_db_str(&text).map_err(serde::de::Error::custom),
        }
    }
}

impl StatusMachine for OfferStage {
    const LIFECYCLE: &'static str = "offer";
    const ALL: &'static [Self] = &[
        OfferStage::InvestorAdvisorReview,
        OfferStage::StartupAdvisorReview,
        OfferStage::ReadyForReview,
        OfferStage::Accepted,
        OfferStage::Rejected,
    ];

    fn allowed_transitions(&self) -> &'static [Self] {
        match self {
            OfferStage::InvestorAdvisorReview => {
                &[OfferStage::StartupAdvisorReview, OfferStage::Rejected]
            }
            OfferStage::StartupAdvisorReview => &[OfferStage::ReadyForReview, OfferStage::Rejected],
            OfferStage::ReadyForReview => &[OfferStage::Accepted, OfferStage::Rejected],
            OfferStage::Accepted => &[],
            OfferStage::Rejected => &[],
        }
    }

    fn settlement_rank(&self) -> u8 {
        match self {
            OfferStage::Rejected => 5,
            stage => stage.number().unwrap_or(0),
        }
    }
}

// ============================================================================
// CO-INVESTMENT APPROVAL
// ============================================================================

/// One link of the co-investment approval chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// The party has no advisor / no say in this offer.
    NotRequired,
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    /// The link no longer blocks the offer.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, ApprovalStatus::Approved | ApprovalStatus::NotRequired)
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            ApprovalStatus::NotRequired => "not_required",
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, StatusParseError> {
        match s.to_lowercase().as_str() {
            "not_required" | "not-required" => Ok(ApprovalStatus::NotRequired),
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            _ => Err(StatusParseError::new(Self::LIFECYCLE, s)),
        }
    }
}

impl StatusMachine for ApprovalStatus {
    const LIFECYCLE: &'static str = "co-investment approval";
    const ALL: &'static [Self] = &[
        ApprovalStatus::NotRequired,
        ApprovalStatus::Pending,
        ApprovalStatus::Approved,
        ApprovalStatus::Rejected,
    ];

    fn allowed_transitions(&self) -> &'static [Self] {
        match self {
            ApprovalStatus::Pending => &[ApprovalStatus::Approved, ApprovalStatus::Rejected],
            _ => &[],
        }
    }

    fn settlement_rank(&self) -> u8 {
        match self {
            ApprovalStatus::Pending => 0,
            _ => 1,
        }
    }
}

// ============================================================================
// RECOGNITION STATUS
// ============================================================================

/// Status of a recognition (fee/equity agreement) record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionStatus {
    #[default]
    Pending,
    Approved,
}

impl RecognitionStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            RecognitionStatus::Pending => "pending",
            RecognitionStatus::Approved => "approved",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, StatusParseError> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RecognitionStatus::Pending),
            "approved" => Ok(RecognitionStatus::Approved),
            _ => Err(StatusParseError::new(Self::LIFECYCLE, s)),
        }
    }
}

impl StatusMachine for RecognitionStatus {
    const LIFECYCLE: &'static str = "recognition";
    const ALL: &'static [Self] = &[RecognitionStatus::Pending, RecognitionStatus::Approved];

    fn allowed_transitions(&self) -> &'static [Self] {
        match self {
            RecognitionStatus::Pending => &[RecognitionStatus::Approved],
            RecognitionStatus::Approved => &[],
        }
    }

    fn settlement_rank(&self) -> u8 {
        match self {
            RecognitionStatus::Pending => 0,
            RecognitionStatus::Approved => 1,
        }
    }
}

// ============================================================================
// INVITATION STATUS
// ============================================================================

/// Status of an out-of-band startup invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Sent,
    Accepted,
    Declined,
}

impl InvitationStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Sent => "sent",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, StatusParseError> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(InvitationStatus::Pending),
            "sent" => Ok(InvitationStatus::Sent),
            "accepted" => Ok(InvitationStatus::Accepted),
            "declined" => Ok(InvitationStatus::Declined),
            _ => Err(StatusParseError::new(Self::LIFECYCLE, s)),
        }
    }
}

impl StatusMachine for InvitationStatus {
    const LIFECYCLE: &'static str = "invitation";
    const ALL: &'static [Self] = &[
        InvitationStatus::Pending,
        InvitationStatus::Sent,
        InvitationStatus::Accepted,
        InvitationStatus::Declined,
    ];

    fn allowed_transitions(&self) -> &'static [Self] {
        match self {
            InvitationStatus::Pending => &[InvitationStatus::Sent],
            InvitationStatus::Sent => &[InvitationStatus::Accepted, InvitationStatus::Declined],
            InvitationStatus::Accepted | InvitationStatus::Declined => &[],
        }
    }

    fn settlement_rank(&self) -> u8 {
        match self {
            InvitationStatus::Pending => 0,
            InvitationStatus::Sent => 1,
            InvitationStatus::Accepted | InvitationStatus::Declined => 2,
        }
    }
}

// ============================================================================
// DISPLAY / FROMSTR
// ============================================================================

macro_rules! impl_status_text {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_db_str())
                }
            }

            impl FromStr for $ty {
                type Err = StatusParseError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    Self::from_db_str(s)
                }
            }
        )+
    };
}

impl_status_text!(
    ApplicationStatus,
    DiligenceStatus,
    OfferStage,
    ApprovalStatus,
    RecognitionStatus,
    InvitationStatus,
);

// ============================================================================
// TESTS
// ============================================================================
