//! The acting user, passed explicitly into every lifecycle operation.

use crate::{FacilitatorCode, StartupId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a principal acts under for the current dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Facilitator,
    Startup,
    Investor,
    InvestorAdvisor,
    StartupAdvisor,
    LeadInvestor,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Facilitator => "facilitator",
            Role::Startup => "startup",
            Role::Investor => "investor",
            Role::InvestorAdvisor => "investor advisor",
            Role::StartupAdvisor => "startup advisor",
            Role::LeadInvestor => "lead investor",
            Role::Admin => "admin",
        };
        f.write_str(name)
    }
}

/// Authenticated user on whose behalf an action runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    /// Startup profile owned by the user, for startup principals.
    pub startup_id: Option<StartupId>,
    /// Facilitator code, for facilitator principals.
    pub facilitator_code: Option<FacilitatorCode>,
}

impl Principal {
    pub fn facilitator(user_id: UserId, code: FacilitatorCode) -> Self {
        Self {
            user_id,
            role: Role::Facilitator,
            startup_id: None,
            facilitator_code: Some(code),
        }
    }

    pub fn startup(user_id: UserId, startup_id: StartupId) -> Self {
        Self {
            user_id,
            role: Role::Startup,
            startup_id: Some(startup_id),
            facilitator_code: None,
        }
    }

    pub fn with_role(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            startup_id: None,
            facilitator_code: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Acting as `role`, or as an admin.
    pub fn acts_as(&self, role: Role) -> bool {
        self.role == role || self.is_admin()
    }

    /// Acting as the startup that owns `startup_id` (admins always pass).
    pub fn owns_startup(&self, startup_id: &StartupId) -> bool {
        self.is_admin()
            || (self.role == Role::Startup && self.startup_id.as_ref() == Some(startup_id))
    }

    /// Acting as the facilitator holding `code` (admins always pass).
    pub fn holds_facilitator_code(&self, code: &FacilitatorCode) -> bool {
        self.is_admin()
            || (self.role == Role::Facilitator && self.facilitator_code.as_ref() == Some(code))
    }
}
