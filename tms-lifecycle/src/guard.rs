//! Per-record in-flight guard.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tms_core::{EntityKind, LifecycleError, LifecycleResult};

type Key = (EntityKind, String);

fn lock(active: &Mutex<HashSet<Key>>) -> MutexGuard<'_, HashSet<Key>> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Set of records with an action currently in flight.
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<Key>>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or fail if another action holds it.
    pub fn acquire(&self, entity: EntityKind, id: &str) -> LifecycleResult<InFlightTicket> {
        let key = (entity, id.to_string());
        if !lock(&self.active).insert(key.clone()) {
            return Err(LifecycleError::ActionInFlight {
                entity,
                id: id.to_string(),
            });
        }
        Ok(InFlightTicket {
            active: Arc::clone(&self.active),
            key,
        })
    }

    pub fn is_active(&self, entity: EntityKind, id: &str) -> bool {
        lock(&self.active).contains(&(entity, id.to_string()))
    }

    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }
}

/// Releases its record when dropped, on success, failure or cancellation.
#[derive(Debug)]
pub struct InFlightTicket {
    active: Arc<Mutex<HashSet<Key>>>,
    key: Key,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.key);
    }
}
