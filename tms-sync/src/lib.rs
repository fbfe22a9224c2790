//! TrackMyStartup Sync - Realtime Reconciliation
//!
//! Local record stores fed by the backend change feed. Inserts and updates
//! go through a last-write-wins merge, deletes leave tombstones, and
//! message echoes are matched against optimistic local copies.

mod error;
mod listener;
mod local_state;
mod message_log;
mod store;

pub use error::{SyncError, SyncResult};
pub use listener::{spawn_change_listener, ReconnectPolicy, Subscription, SyncMessage};
pub use local_state::{Applied, LocalState};
pub use message_log::{MessageLog, DEFAULT_ECHO_WINDOW};
pub use store::{incoming_wins, incoming_wins_at, MergeOutcome, RecordStore, TOMBSTONE_RETENTION_SECS};
