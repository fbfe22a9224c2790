//! Identity types for TrackMyStartup records
//!
//! The backend assigns opaque string keys. Each entity gets its own newtype
//! so an application id can never be passed where an offer id is expected.

use chrono::{DateTime, Utc};
use std::fmt;
use std::hash::Hash;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Prefix used for ids minted on the client before the server echoes a row.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Common behaviour of every typed record id.
pub trait RecordIdType:
    Clone + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Wrap a raw backend key.
    fn new(raw: impl Into<String>) -> Self;

    /// Borrow the raw backend key.
    fn as_str(&self) -> &str;

    /// Mint a client-side placeholder id (UUIDv7, so placeholders sort by creation time).
    fn local() -> Self {
        Self::new(format!("{}{}", LOCAL_ID_PREFIX, Uuid::now_v7()))
    }

    /// Whether this id was minted locally and has not been confirmed by the server.
    fn is_local(&self) -> bool {
        self.as_str().starts_with(LOCAL_ID_PREFIX)
    }
}

macro_rules! define_record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl RecordIdType for $name {
            fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

define_record_id!(
    /// Startup application to a facilitator opportunity.
    ApplicationId
);
define_record_id!(
    /// Facilitator program / opportunity.
    OpportunityId
);
define_record_id!(
    /// Direct or co-investment offer.
    OfferId
);
define_record_id!(
    /// Lead-investor allocation that co-investment offers hang off.
    CoInvestmentOpportunityId
);
define_record_id!(
    /// Incubation fee/equity agreement.
    RecognitionId
);
define_record_id!(
    /// Facilitator-initiated startup invitation.
    InvitationId
);
define_record_id!(
    /// Message exchanged on an application thread.
    MessageId
);
define_record_id!(
    /// Any authenticated user (facilitator, startup, investor, advisor).
    UserId
);
define_record_id!(
    /// Startup profile.
    StartupId
);

/// Short code a facilitator shares with startups to link recognition records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct FacilitatorCode(String);

impl FacilitatorCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FacilitatorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_ids_are_marked_local() {
        let id = MessageId::local();
        assert!(id.is_local());
        assert!(id.as_str().starts_with(LOCAL_ID_PREFIX));
    }

    #[test]
    fn test_server_ids_are_not_local() {
        let id = ApplicationId::new("8f3c2a");
        assert!(!id.is_local());
        assert_eq!(id.to_string(), "8f3c2a");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = OfferId::from("offer-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"offer-42\"");
        let back: OfferId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
