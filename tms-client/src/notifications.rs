//! User-facing notifications raised by the dashboard session.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Oldest notifications are dropped past this many.
pub const MAX_NOTIFICATIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    Retry,
    Reconnect,
    Dismiss,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub action: Option<NotificationAction>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            action: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationQueue {
    items: VecDeque<Notification>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: Notification) {
        if self.items.len() == MAX_NOTIFICATIONS {
            self.items.pop_front();
        }
        self.items.push_back(notification);
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.items.back()
    }

    /// Take every pending notification, oldest first.
    pub fn drain(&mut self) -> Vec<Notification> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_drops_oldest() {
        let mut queue = NotificationQueue::new();
        for i in 0..(MAX_NOTIFICATIONS + 3) {
            queue.push(Notification::new(NotificationLevel::Info, format!("n{}", i)));
        }
        assert_eq!(queue.len(), MAX_NOTIFICATIONS);
        let drained = queue.drain();
        assert_eq!(drained[0].message, "n3");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_with_action() {
        let n = Notification::new(NotificationLevel::Warning, "feed dropped")
            .with_action(NotificationAction::Reconnect);
        assert_eq!(n.action, Some(NotificationAction::Reconnect));
    }
}
