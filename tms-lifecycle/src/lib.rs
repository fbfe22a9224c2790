//! TrackMyStartup Lifecycle Reconciler
//!
//! Decides whether a dashboard action is legal for the acting principal and
//! the record's current state, and applies it through the mutation gateway.
//!
//! Every operation on [`Reconciler`] follows the same path:
//! 1. authorize the [`Principal`](tms_core::Principal) (`Forbidden`)
//! 2. check the status transition (`InvalidTransition`)
//! 3. claim the record in the in-flight guard (`ActionInFlight`)
//! 4. issue the gateway call; a conflict refetches the authoritative copy
//! 5. return the decoded record the backend sent back
//!
//! Local refusals never reach the gateway.

mod applications;
mod documents;
mod guard;
mod invitations;
mod messages;
mod offers;
mod recognition;
mod reconciler;

pub use documents::document_path;
pub use guard::{InFlightGuard, InFlightTicket};
pub use offers::Approver;
pub use reconciler::Reconciler;
