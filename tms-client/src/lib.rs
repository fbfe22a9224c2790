//! TrackMyStartup Client - Dashboard Session
//!
//! Wires the lifecycle reconciler, the realtime change listener and the
//! view projections into one [`DashboardSession`] per mounted dashboard,
//! together with configuration loading, logging setup, user
//! notifications and persisted view preferences.

pub mod config;
pub mod error;
pub mod notifications;
pub mod persistence;
pub mod session;
pub mod telemetry;

pub use config::{DashboardConfig, LogFormat};
pub use error::{ClientError, ClientResult};
pub use notifications::{Notification, NotificationAction, NotificationLevel, NotificationQueue};
pub use persistence::{ListKind, ViewPreferences};
pub use session::{default_subscriptions, DashboardSession, ListView, MountGuard, SessionSettings};
