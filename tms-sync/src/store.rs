//! Keyed record store with last-write-wins merge.

use crate::error::{SyncError, SyncResult};
use chrono::Duration;
use std::collections::HashMap;
use tms_core::{Reconcilable, RecordIdType, Timestamp};

/// How long a timed tombstone outlives the newest event the store has seen.
pub const TOMBSTONE_RETENTION_SECS: i64 = 600;

/// What an upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    /// Existing copy was newer or more settled.
    KeptExisting,
}

/// Whether `incoming` should replace `existing`, judged by the records' own timestamps.
pub fn incoming_wins<T: Reconcilable>(existing: &T, incoming: &T) -> bool {
    incoming_wins_at(
        existing,
        existing.server_timestamp(),
        incoming,
        incoming.server_timestamp(),
    )
}

/// Whether `incoming` should replace `existing` given each copy's effective time.
///
/// Newer time wins. With equal or missing times the more settled status wins,
/// ties going to the incoming copy.
pub fn incoming_wins_at<T: Reconcilable>(
    existing: &T,
    existing_at: Option<Timestamp>,
    incoming: &T,
    incoming_at: Option<Timestamp>,
) -> bool {
    match (existing_at, incoming_at) {
        (Some(current), Some(next)) if current != next => next > current,
        _ => incoming.settlement_rank() >= existing.settlement_rank(),
    }
}

/// Local set of one record type, keyed by id.
#[derive(Debug, Clone)]
pub struct RecordStore<T: Reconcilable> {
    records: HashMap<T::Id, T>,
    /// Effective merge time of each record: its `updated_at`, else the commit time it arrived with.
    stamps: HashMap<T::Id, Timestamp>,
    /// Deleted ids and the delete's commit time, if known.
    tombstones: HashMap<T::Id, Option<Timestamp>>,
    newest_seen: Option<Timestamp>,
}

impl<T: Reconcilable> Default for RecordStore<T> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            stamps: HashMap::new(),
            tombstones: HashMap::new(),
            newest_seen: None,
        }
    }
}

impl<T: Reconcilable> RecordStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.records.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.values()
    }

    /// Owned copy of every record, for projections.
    pub fn snapshot(&self) -> Vec<T> {
        self.records.values().cloned().collect()
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    /// Replace the whole set with a manual reload.
    pub fn seed(&mut self, records: impl IntoIterator<Item = T>) {
        self.records.clear();
        self.stamps.clear();
        self.tombstones.clear();
        for record in records {
            self.install(record, None);
        }
    }

    /// Merge one record delivered by the feed.
    ///
    /// `commit_timestamp` stands in for the record's `updated_at` when the row has none.
    pub fn apply_upsert(
        &mut self,
        record: T,
        commit_timestamp: Option<Timestamp>,
    ) -> SyncResult<MergeOutcome> {
        let id = record.id().clone();
        let incoming_at = record.server_timestamp().or(commit_timestamp);
        self.observe(incoming_at);

        if let Some(deleted_at) = self.tombstones.get(&id) {
            let resurrects = matches!(
                (deleted_at, incoming_at),
                (Some(deleted), Some(updated)) if updated > *deleted
            );
            if !resurrects {
                return Err(SyncError::StaleEvent {
                    entity: record.entity_kind(),
                    id: id.as_str().to_string(),
                });
            }
            self.tombstones.remove(&id);
        }

        let Some(existing) = self.records.get(&id) else {
            self.install(record, commit_timestamp);
            return Ok(MergeOutcome::Inserted);
        };
        let existing_at = self.stamps.get(&id).copied();
        if incoming_wins_at(existing, existing_at, &record, incoming_at) {
            self.install(record, commit_timestamp);
            Ok(MergeOutcome::Replaced)
        } else {
            Ok(MergeOutcome::KeptExisting)
        }
    }

    /// Remove a record deleted remotely and block stale copies of it.
    ///
    /// Timed tombstones more than [`TOMBSTONE_RETENTION_SECS`] behind the newest
    /// event seen are dropped here. Untimed ones last until the next reload.
    pub fn apply_delete(&mut self, id: &T::Id, deleted_at: Option<Timestamp>) -> bool {
        self.observe(deleted_at);
        let tombstone = self.tombstones.entry(id.clone()).or_insert(deleted_at);
        if let (Some(current), Some(next)) = (*tombstone, deleted_at) {
            if next > current {
                *tombstone = Some(next);
            }
        }
        if let Some(newest) = self.newest_seen {
            self.prune_tombstones(newest - Duration::seconds(TOMBSTONE_RETENTION_SECS));
        }
        self.stamps.remove(id);
        self.records.remove(id).is_some()
    }

    /// Forget timed tombstones whose delete committed before `cutoff`. Returns how many went.
    pub fn prune_tombstones(&mut self, cutoff: Timestamp) -> usize {
        let before = self.tombstones.len();
        self.tombstones
            .retain(|_, deleted_at| deleted_at.map_or(true, |at| at >= cutoff));
        before - self.tombstones.len()
    }

    /// Install the authoritative copy returned by a mutation, skipping the merge rule.
    pub fn replace_authoritative(&mut self, record: T) {
        self.tombstones.remove(record.id());
        self.install(record, None);
    }

    /// Drop a record this client deleted. Nothing resurrects it until the next reload.
    pub fn remove_authoritative(&mut self, id: &T::Id) -> Option<T> {
        self.tombstones.insert(id.clone(), None);
        self.stamps.remove(id);
        self.records.remove(id)
    }

    fn install(&mut self, record: T, commit_timestamp: Option<Timestamp>) {
        let id = record.id().clone();
        match record.server_timestamp().or(commit_timestamp) {
            Some(at) => self.stamps.insert(id.clone(), at),
            None => self.stamps.remove(&id),
        };
        self.records.insert(id, record);
    }

    fn observe(&mut self, at: Option<Timestamp>) {
        if let Some(at) = at {
            self.newest_seen = Some(self.newest_seen.map_or(at, |seen| seen.max(at)));
        }
    }
}
