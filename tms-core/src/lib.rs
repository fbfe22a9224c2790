//! TrackMyStartup Core - Record Types
//!
//! Typed ids, the closed status model, record structures, the acting
//! principal and the error taxonomy. Every other crate depends on this one.

mod entities;
mod enums;
mod error;
mod identity;
mod principal;
mod status;

pub use entities::*;
pub use enums::*;
pub use error::*;
pub use identity::*;
pub use principal::*;
pub use status::*;
