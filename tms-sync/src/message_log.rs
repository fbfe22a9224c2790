//! Message threads with optimistic sends and echo suppression.
//!
//! A sent message shows up locally before the backend confirms it, then
//! again when the realtime insert for it arrives. The echo must confirm the
//! local copy in place rather than show twice.

use crate::error::{SyncError, SyncResult};
use chrono::TimeDelta;
use std::time::Duration;
use tms_core::{ApplicationId, Delivery, EntityKind, Message, MessageId, RecordIdType};

/// Default window within which an echo may confirm an optimistic copy.
pub const DEFAULT_ECHO_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct MessageLog {
    /// Ordered by `sent_at`.
    messages: Vec<Message>,
    echo_window: TimeDelta,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_WINDOW)
    }
}

impl MessageLog {
    pub fn new(echo_window: Duration) -> Self {
        Self {
            messages: Vec::new(),
            echo_window: TimeDelta::from_std(echo_window).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_optimistic()).count()
    }

    /// Messages of one application thread, oldest first.
    pub fn thread(&self, application_id: &ApplicationId) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| &m.application_id == application_id)
            .collect()
    }

    /// Replace everything with a manual reload.
    pub fn seed(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages = messages.into_iter().collect();
        self.sort();
    }

    /// Show a message before the backend has confirmed it.
    pub fn push_optimistic(&mut self, message: Message) {
        self.messages.push(message);
        self.sort();
    }

    /// Swap the optimistic copy for the row the backend returned.
    ///
    /// If the realtime echo already confirmed it, the local copy is just dropped.
    pub fn confirm(&mut self, local_id: &MessageId, mut confirmed: Message) {
        confirmed.delivery = Delivery::Confirmed;
        let echoed = self.messages.iter().any(|m| m.id == confirmed.id);
        if echoed {
            self.messages.retain(|m| &m.id != local_id);
            return;
        }
        match self.messages.iter_mut().find(|m| &m.id == local_id) {
            Some(slot) => *slot = confirmed,
            None => self.messages.push(confirmed),
        }
        self.sort();
    }

    /// Remove an optimistic copy whose send failed.
    pub fn discard(&mut self, local_id: &MessageId) -> Option<Message> {
        let index = self.messages.iter().position(|m| &m.id == local_id)?;
        Some(self.messages.remove(index))
    }

    /// Apply a realtime insert.
    ///
    /// Dedup is by id first. Failing that, an optimistic message from the same
    /// sender with the same text sent within the echo window is taken to be
    /// this message and confirmed in place.
    pub fn apply_insert(&mut self, mut incoming: Message) -> SyncResult<()> {
        incoming.delivery = Delivery::Confirmed;
        if self.messages.iter().any(|m| m.id == incoming.id) {
            return Err(SyncError::DuplicateEvent {
                entity: EntityKind::Message,
                id: incoming.id.as_str().to_string(),
            });
        }

        let window = self.echo_window;
        let echo_of = self.messages.iter_mut().find(|m| {
            m.is_optimistic()
                && m.sender_id == incoming.sender_id
                && m.application_id == incoming.application_id
                && m.text == incoming.text
                && (m.sent_at - incoming.sent_at).abs() <= window
        });
        match echo_of {
            Some(slot) => *slot = incoming,
            None => self.messages.push(incoming),
        }
        self.sort();
        Ok(())
    }

    pub fn apply_delete(&mut self, id: &MessageId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| &m.id != id);
        self.messages.len() != before
    }

    fn sort(&mut self) {
        self.messages.sort_by_key(|m| m.sent_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tms_core::UserId;
    use tms_test_utils::fixtures::message;
    use tms_test_utils::ts;

    fn optimistic(text: &str, offset: i64) -> Message {
        Message::optimistic(
            ApplicationId::new("app-1"),
            UserId::new("founder-1"),
            text,
            ts(offset),
        )
    }

    #[test]
    fn test_echo_confirms_optimistic_copy_in_place() {
        let mut log = MessageLog::default();
        log.push_optimistic(optimistic("Signed contract attached", 0));

        log.apply_insert(message("m-1", "founder-1", "Signed contract attached", ts(2)))
            .unwrap();

        assert_eq!(log.len(), 1);
        assert_eq!(log.pending_count(), 0);
        assert!(log.get(&MessageId::new("m-1")).is_some());
    }

    #[test]
    fn test_redelivery_is_duplicate() {
        let mut log = MessageLog::default();
        log.apply_insert(message("m-1", "founder-1", "hi", ts(0))).unwrap();
        let err = log
            .apply_insert(message("m-1", "founder-1", "hi", ts(0)))
            .unwrap_err();
        assert!(err.is_benign());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_echo_outside_window_is_a_new_message() {
        let mut log = MessageLog::default();
        log.push_optimistic(optimistic("ping", 0));
        log.apply_insert(message("m-1", "founder-1", "ping", ts(6))).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.pending_count(), 1);
    }

    #[test]
    fn test_other_sender_does_not_confirm() {
        let mut log = MessageLog::default();
        log.push_optimistic(optimistic("ok", 0));
        log.apply_insert(message("m-1", "facilitator-1", "ok", ts(1))).unwrap();
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_confirm_after_echo_drops_local_copy() {
        let mut log = MessageLog::new(Duration::from_secs(0));
        let local = optimistic("late", 0);
        let local_id = local.id.clone();
        log.push_optimistic(local);
        // Zero window: the echo cannot match heuristically.
        log.apply_insert(message("m-9", "founder-1", "late", ts(1))).unwrap();
        assert_eq!(log.len(), 2);

        log.confirm(&local_id, message("m-9", "founder-1", "late", ts(1)));
        assert_eq!(log.len(), 1);
        assert_eq!(log.pending_count(), 0);
    }

    #[test]
    fn test_confirm_before_echo_then_echo_is_duplicate() {
        let mut log = MessageLog::default();
        let local = optimistic("first", 0);
        let local_id = local.id.clone();
        log.push_optimistic(local);
        log.confirm(&local_id, message("m-1", "founder-1", "first", ts(0)));

        assert!(log
            .apply_insert(message("m-1", "founder-1", "first", ts(0)))
            .is_err());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_discard_removes_failed_send() {
        let mut log = MessageLog::default();
        let local = optimistic("lost", 0);
        let local_id = local.id.clone();
        log.push_optimistic(local);
        assert!(log.discard(&local_id).is_some());
        assert!(log.is_empty());
    }

    #[test]
    fn test_thread_is_chronological() {
        let mut log = MessageLog::default();
        log.apply_insert(message("m-2", "a", "second", ts(20))).unwrap();
        log.apply_insert(message("m-1", "b", "first", ts(10))).unwrap();
        let thread = log.thread(&ApplicationId::new("app-1"));
        assert_eq!(thread[0].text, "first");
        assert_eq!(thread[1].text, "second");
    }
}
