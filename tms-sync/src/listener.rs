//! Change-feed listener with reconnect backoff.

use futures_util::StreamExt;
use serde::Deserialize;
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::sync::Arc;
use std::time::Duration;
use tms_core::EntityKind;
use tms_gateway::{ChangeEvent, ChangeFeed, FeedFilter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Reconnect schedule for a dropped subscription.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectPolicy {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub jitter_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_ms: 500,
            max_ms: 30_000,
            multiplier: 2.0,
            jitter_ms: 250,
        }
    }
}

impl ReconnectPolicy {
    /// Un-jittered wait before the zero-based `attempt`, capped at `max_ms`.
    pub fn base_delay_ms(&self, attempt: u32) -> u64 {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let grown = self.initial_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        (grown as u64).min(self.max_ms)
    }

    /// Base delay plus a spread below `jitter_ms`, drawn from the task's own hasher keys.
    pub fn delay_for(&self, attempt: u32, spread: &RandomState) -> Duration {
        let jitter = match self.jitter_ms {
            0 => 0,
            window => spread.hash_one(attempt) % window,
        };
        Duration::from_millis(self.base_delay_ms(attempt).saturating_add(jitter))
    }
}

/// One table subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub entity: EntityKind,
    pub filter: Option<FeedFilter>,
}

impl Subscription {
    pub fn all(entity: EntityKind) -> Self {
        Self { entity, filter: None }
    }

    pub fn filtered(entity: EntityKind, filter: FeedFilter) -> Self {
        Self {
            entity,
            filter: Some(filter),
        }
    }
}

/// Messages forwarded by the listener to the owning session.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncMessage {
    Connected { entity: EntityKind },
    Change(ChangeEvent),
    Disconnected { entity: EntityKind, reason: String },
    Error { entity: EntityKind, message: String },
}

/// Spawn one task per subscription. Each task reconnects with jittered
/// exponential backoff and exits once `sender`'s receiver is dropped.
pub fn spawn_change_listener(
    feed: Arc<dyn ChangeFeed>,
    subscriptions: Vec<Subscription>,
    policy: ReconnectPolicy,
    sender: mpsc::Sender<SyncMessage>,
) -> Vec<JoinHandle<()>> {
    subscriptions
        .into_iter()
        .map(|subscription| {
            let feed = Arc::clone(&feed);
            let sender = sender.clone();
            tokio::spawn(run_subscription(feed, subscription, policy, sender))
        })
        .collect()
}

async fn run_subscription(
    feed: Arc<dyn ChangeFeed>,
    subscription: Subscription,
    policy: ReconnectPolicy,
    sender: mpsc::Sender<SyncMessage>,
) {
    let entity = subscription.entity;
    let spread = RandomState::new();
    let mut attempt: u32 = 0;
    loop {
        match feed.subscribe(entity, subscription.filter.clone()).await {
            Ok(mut stream) => {
                tracing::info!(entity = %entity, "Change feed connected");
                if sender.send(SyncMessage::Connected { entity }).await.is_err() {
                    return;
                }
                attempt = 0;

                let mut reason = "stream closed".to_string();
                while let Some(item) = stream.next().await {
                    let message = match item {
                        Ok(event) => SyncMessage::Change(event),
                        Err(err) => {
                            reason = err.to_string();
                            break;
                        }
                    };
                    if sender.send(message).await.is_err() {
                        return;
                    }
                }

                tracing::warn!(entity = %entity, reason = %reason, "Change feed disconnected");
                if sender
                    .send(SyncMessage::Disconnected { entity, reason })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(err) => {
                tracing::warn!(entity = %entity, error = %err, "Change feed subscribe failed");
                let message = SyncMessage::Error {
                    entity,
                    message: err.to_string(),
                };
                if sender.send(message).await.is_err() {
                    return;
                }
            }
        }

        tokio::time::sleep(policy.delay_for(attempt, &spread)).await;
        attempt = attempt.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tms_core::GatewayError;
    use tms_gateway::{ChangeOperation, MockChangeFeed};

    fn fast_policy() -> ReconnectPolicy {
        ReconnectPolicy {
            initial_ms: 1,
            max_ms: 4,
            multiplier: 2.0,
            jitter_ms: 0,
        }
    }

    fn app_event(id: &str) -> ChangeEvent {
        ChangeEvent {
            entity: EntityKind::Application,
            operation: ChangeOperation::Insert,
            payload: json!({"id": id, "startup_id": "startup-1"}),
            commit_timestamp: None,
        }
    }

    #[test]
    fn test_base_delay_grows_then_caps() {
        let policy = ReconnectPolicy {
            jitter_ms: 0,
            ..ReconnectPolicy::default()
        };
        assert_eq!(policy.base_delay_ms(0), 500);
        assert_eq!(policy.base_delay_ms(3), 4_000);
        assert_eq!(policy.base_delay_ms(7), 30_000);
        assert_eq!(policy.base_delay_ms(u32::MAX), 30_000);
        assert_eq!(policy.delay_for(2, &RandomState::new()), Duration::from_millis(2_000));
    }

    #[test]
    fn test_jitter_stays_inside_window() {
        let policy = ReconnectPolicy::default();
        let spread = RandomState::new();
        for attempt in 0..20 {
            let base = Duration::from_millis(policy.base_delay_ms(attempt));
            let delay = policy.delay_for(attempt, &spread);
            assert!(delay >= base);
            assert!(delay < base + Duration::from_millis(policy.jitter_ms));
        }
    }

    #[tokio::test]
    async fn test_forwards_matching_changes() {
        let feed = MockChangeFeed::new();
        let (tx, mut rx) = mpsc::channel(16);
        let handles = spawn_change_listener(
            Arc::new(feed.clone()),
            vec![Subscription::filtered(
                EntityKind::Application,
                FeedFilter::eq("startup_id", "startup-1"),
            )],
            fast_policy(),
            tx,
        );

        assert_eq!(
            rx.recv().await,
            Some(SyncMessage::Connected {
                entity: EntityKind::Application
            })
        );
        feed.publish(app_event("app-1"));
        match rx.recv().await {
            Some(SyncMessage::Change(event)) => assert_eq!(event.record_id(), Some("app-1")),
            other => panic!("expected change, got {:?}", other),
        }

        drop(rx);
        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn test_reconnects_after_refusal_and_disconnect() {
        let feed = MockChangeFeed::new();
        feed.refuse_next_subscriptions(1);
        let (tx, mut rx) = mpsc::channel(16);
        let handles = spawn_change_listener(
            Arc::new(feed.clone()),
            vec![Subscription::all(EntityKind::Message)],
            fast_policy(),
            tx,
        );

        assert!(matches!(rx.recv().await, Some(SyncMessage::Error { .. })));
        assert!(matches!(rx.recv().await, Some(SyncMessage::Connected { .. })));

        feed.disconnect_all();
        assert!(matches!(rx.recv().await, Some(SyncMessage::Disconnected { .. })));
        assert!(matches!(rx.recv().await, Some(SyncMessage::Connected { .. })));
        assert_eq!(feed.subscribe_attempts(), 3);

        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn test_stream_error_reported_as_disconnect() {
        let feed = MockChangeFeed::new();
        let (tx, mut rx) = mpsc::channel(16);
        let handles = spawn_change_listener(
            Arc::new(feed.clone()),
            vec![Subscription::all(EntityKind::Application)],
            fast_policy(),
            tx,
        );
        assert!(matches!(rx.recv().await, Some(SyncMessage::Connected { .. })));

        feed.push_error(
            EntityKind::Application,
            GatewayError::Network {
                reason: "socket reset".to_string(),
            },
        );
        match rx.recv().await {
            Some(SyncMessage::Disconnected { reason, .. }) => assert!(reason.contains("socket reset")),
            other => panic!("expected disconnect, got {:?}", other),
        }

        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn test_exits_when_receiver_dropped() {
        let feed = MockChangeFeed::new();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handles = spawn_change_listener(
            Arc::new(feed),
            vec![Subscription::all(EntityKind::Application)],
            fast_policy(),
            tx,
        );
        for handle in handles {
            assert!(handle.await.is_ok());
        }
    }
}
