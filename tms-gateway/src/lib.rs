//! TrackMyStartup Gateway - Backend Boundaries
//!
//! Async traits for the two ways the dashboard talks to the hosted backend:
//! [`MutationGateway`] for writes and reads of single rows, and
//! [`ChangeFeed`] for realtime row changes. [`MockGateway`] and
//! [`MockChangeFeed`] implement both in memory.

mod change;
mod gateway;
mod mock;
pub mod procedures;

pub use change::{ChangeEvent, ChangeFeed, ChangeOperation, ChangeStream, FeedFilter};
pub use gateway::{MutationGateway, UploadedFile, DOCUMENT_BUCKET};
pub use mock::{GatewayCall, MockChangeFeed, MockGateway};
