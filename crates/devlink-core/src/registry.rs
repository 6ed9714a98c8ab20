// ── Subscription registry ──
//
// Live subscription id -> filter + callback + lifecycle state.
// Concurrent delivery tasks re-check membership here at delivery time,
// so a just-cancelled id silently drops late events instead of
// invoking a stale callback.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use dashmap::DashMap;
use tracing::warn;

use devlink_transport::{Reply, SubscriptionId};

use crate::correlation::EventCallback;
use crate::model::{FilterSpec, SubscriptionState};

/// One live subscription.
pub struct SubscriptionEntry {
    pub filter: FilterSpec,
    callback: EventCallback,
    state: AtomicU8,
}

impl SubscriptionEntry {
    fn new(filter: FilterSpec, callback: EventCallback) -> Self {
        Self {
            filter,
            callback,
            state: AtomicU8::new(SubscriptionState::Created as u8),
        }
    }

    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SubscriptionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Forward one event to the caller's callback. The state machine is
    /// deliberately not consulted: events arriving while still Created
    /// are delivered, only removal from the registry suppresses them.
    pub fn notify(&self, reply: Reply) {
        (self.callback)(reply);
    }
}

/// Thread-safe table of live subscriptions.
pub struct SubscriptionRegistry {
    entries: DashMap<SubscriptionId, Arc<SubscriptionEntry>>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register a subscription. Ids are system-generated, so a
    /// duplicate is unexpected: last write wins, with a warning.
    pub fn put(&self, id: SubscriptionId, filter: FilterSpec, callback: EventCallback) {
        let entry = Arc::new(SubscriptionEntry::new(filter, callback));
        if self.entries.insert(id, entry).is_some() {
            warn!(subscription_id = %id, "replacing existing subscription entry");
        }
    }

    #[must_use]
    pub fn get(&self, id: &SubscriptionId) -> Option<Arc<SubscriptionEntry>> {
        self.entries.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a subscription, marking it Cancelled for any holder of
    /// the entry. Returns `None` when the id was unknown.
    pub fn remove(&self, id: &SubscriptionId) -> Option<Arc<SubscriptionEntry>> {
        let removed = self.entries.remove(id).map(|(_, entry)| entry);
        if let Some(entry) = &removed {
            entry.set_state(SubscriptionState::Cancelled);
        }
        removed
    }

    /// Flip a subscription to Active once its initial-fetch barrier has
    /// resolved. No-op for cancelled/unknown ids.
    pub fn mark_active(&self, id: &SubscriptionId) {
        if let Some(entry) = self.entries.get(id) {
            entry.set_state(SubscriptionState::Active);
        }
    }

    /// Administrative listing: filter specs for the requested ids.
    /// Unknown ids are simply absent from the result.
    #[must_use]
    pub fn list(&self, ids: &[SubscriptionId]) -> HashMap<SubscriptionId, FilterSpec> {
        ids.iter()
            .filter_map(|id| {
                self.entries
                    .get(id)
                    .map(|entry| (*id, entry.filter.clone()))
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
