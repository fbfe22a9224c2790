//! Enum types shared across the workspace

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Entity type discriminator. Doubles as the backend table selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Application,
    InvestmentOffer,
    CoInvestmentOffer,
    RecognitionRecord,
    StartupInvitation,
    Message,
}

impl EntityKind {
    pub const ALL: &'static [EntityKind] = &[
        EntityKind::Application,
        EntityKind::InvestmentOffer,
        EntityKind::CoInvestmentOffer,
        EntityKind::RecognitionRecord,
        EntityKind::StartupInvitation,
        EntityKind::Message,
    ];

    /// Backend table holding rows of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Application => "opportunity_applications",
            EntityKind::InvestmentOffer => "investment_offers",
            EntityKind::CoInvestmentOffer => "co_investment_offers",
            EntityKind::RecognitionRecord => "recognition_records",
            EntityKind::StartupInvitation => "startup_invitations",
            EntityKind::Message => "incubation_messages",
        }
    }

    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.table() == table)
    }

    /// Label used in user-facing text.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Application => "application",
            EntityKind::InvestmentOffer => "investment offer",
            EntityKind::CoInvestmentOffer => "co-investment offer",
            EntityKind::RecognitionRecord => "recognition record",
            EntityKind::StartupInvitation => "invitation",
            EntityKind::Message => "message",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Fee structure of a recognition record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeType {
    Free,
    Fees,
    Equity,
    Hybrid,
}

impl FeeType {
    pub const ALL: &'static [FeeType] = &[FeeType::Free, FeeType::Fees, FeeType::Equity, FeeType::Hybrid];

    /// Whether shares / price per share / equity allocated carry meaning.
    pub fn involves_equity(&self) -> bool {
        matches!(self, FeeType::Equity | FeeType::Hybrid)
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            FeeType::Free => "Free",
            FeeType::Fees => "Fees",
            FeeType::Equity => "Equity",
            FeeType::Hybrid => "Hybrid",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, FeeTypeParseError> {
        match s.to_lowercase().as_str() {
            "free" => Ok(FeeType::Free),
            "fees" | "fee" => Ok(FeeType::Fees),
            "equity" => Ok(FeeType::Equity),
            "hybrid" => Ok(FeeType::Hybrid),
            _ => Err(FeeTypeParseError(s.to_string())),
        }
    }
}

impl fmt::Display for FeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for FeeType {
    type Err = FeeTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid fee type string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid fee type: {0}")]
pub struct FeeTypeParseError(pub String);

/// Document slot on an accepted application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSlot {
    /// Incubation agreement, uploaded by the facilitator.
    Agreement,
    /// Signed contract, uploaded by the startup.
    Contract,
}

impl DocumentSlot {
    /// Column holding the public URL of the uploaded file.
    pub fn url_column(&self) -> &'static str {
        match self {
            DocumentSlot::Agreement => "agreement_url",
            DocumentSlot::Contract => "contract_url",
        }
    }

    pub fn folder(&self) -> &'static str {
        match self {
            DocumentSlot::Agreement => "agreements",
            DocumentSlot::Contract => "contracts",
        }
    }
}

/// Every action the reconciler can take. Used for logging, guards and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    AcceptApplication,
    RejectApplication,
    WithdrawApplication,
    RequestDiligence,
    ApproveDiligence,
    RejectDiligence,
    AcceptOffer,
    RejectOffer,
    AdvanceOfferStage,
    ApproveCoInvestment,
    RejectCoInvestment,
    DeleteOffer,
    ApproveRecognition,
    InviteStartup,
    AdvanceInvitation,
    AttachDocument,
    SendMessage,
}

impl LifecycleAction {
    /// Short verb phrase for notifications ("accept", "request diligence on").
    pub fn verb(&self) -> &'static str {
        match self {
            LifecycleAction::AcceptApplication | LifecycleAction::AcceptOffer => "accept",
            LifecycleAction::RejectApplication | LifecycleAction::RejectOffer => "reject",
            LifecycleAction::WithdrawApplication => "withdraw",
            LifecycleAction::RequestDiligence => "request diligence on",
            LifecycleAction::ApproveDiligence => "approve diligence on",
            LifecycleAction::RejectDiligence => "reject diligence on",
            LifecycleAction::AdvanceOfferStage => "advance",
            LifecycleAction::ApproveCoInvestment => "approve",
            LifecycleAction::RejectCoInvestment => "decline",
            LifecycleAction::DeleteOffer => "delete",
            LifecycleAction::ApproveRecognition => "approve",
            LifecycleAction::InviteStartup => "create",
            LifecycleAction::AdvanceInvitation => "update",
            LifecycleAction::AttachDocument => "attach a document to",
            LifecycleAction::SendMessage => "send",
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleAction::AcceptApplication => "accept_application",
            LifecycleAction::RejectApplication => "reject_application",
            LifecycleAction::WithdrawApplication => "withdraw_application",
            LifecycleAction::RequestDiligence => "request_diligence",
            LifecycleAction::ApproveDiligence => "approve_diligence",
            LifecycleAction::RejectDiligence => "reject_diligence",
            LifecycleAction::AcceptOffer => "accept_offer",
            LifecycleAction::RejectOffer => "reject_offer",
            LifecycleAction::AdvanceOfferStage => "advance_offer_stage",
            LifecycleAction::ApproveCoInvestment => "approve_co_investment",
            LifecycleAction::RejectCoInvestment => "reject_co_investment",
            LifecycleAction::DeleteOffer => "delete_offer",
            LifecycleAction::ApproveRecognition => "approve_recognition",
            LifecycleAction::InviteStartup => "invite_startup",
            LifecycleAction::AdvanceInvitation => "advance_invitation",
            LifecycleAction::AttachDocument => "attach_document",
            LifecycleAction::SendMessage => "send_message",
        };
        f.write_str(name)
    }
}
