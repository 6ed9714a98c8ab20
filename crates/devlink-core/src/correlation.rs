// ── Correlation registry ──
//
// Maps correlation ids to pending results. Single-reply entries resolve
// exactly once through an atomic check-and-remove; streaming entries
// forward every EVENT reply to their callback until explicitly
// cancelled. This is the engine's `ReplySink`: transport delivery tasks
// call `deliver` concurrently from any number of threads.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use devlink_transport::{CorrelationId, Reply, ReplySink, ReplyTag, SubscriptionId};

/// Callback invoked for every EVENT reply under a subscription id.
pub type EventCallback = Arc<dyn Fn(Reply) + Send + Sync>;

/// Thread-safe registry of pending round trips and open streams.
pub struct CorrelationRegistry {
    /// Pending single-reply handles; removed atomically on the first
    /// terminal reply.
    singles: DashMap<CorrelationId, oneshot::Sender<Reply>>,

    /// Open streaming handles, keyed by subscription id; removed only
    /// by explicit cancellation.
    streams: DashMap<SubscriptionId, EventCallback>,
}

impl CorrelationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            singles: DashMap::new(),
            streams: DashMap::new(),
        }
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register a single-reply handle. The receiver yields the first
    /// terminal reply tagged for this correlation id.
    pub fn register_single(&self, correlation_id: CorrelationId) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        if self.singles.insert(correlation_id, tx).is_some() {
            // Correlation ids are generated per request; a collision
            // means a caller reused one.
            warn!(correlation_id = %correlation_id, "replaced pending single-reply handle");
        }
        rx
    }

    /// Drop a pending single-reply handle without resolving it.
    /// Idempotent.
    pub fn cancel_single(&self, correlation_id: &CorrelationId) -> bool {
        self.singles.remove(correlation_id).is_some()
    }

    /// Register the shared streaming callback for a subscription id.
    pub fn register_stream(&self, subscription_id: SubscriptionId, callback: EventCallback) {
        if self.streams.insert(subscription_id, callback).is_some() {
            warn!(subscription_id = %subscription_id, "replaced streaming handle");
        }
    }

    /// Remove a streaming handle. Idempotent; late events for the id
    /// are dropped by `deliver`.
    pub fn cancel_stream(&self, subscription_id: &SubscriptionId) -> bool {
        self.streams.remove(subscription_id).is_some()
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    /// Number of live streaming handles.
    #[must_use]
    pub fn streaming_count(&self) -> usize {
        self.streams.len()
    }

    /// Number of pending single-reply handles.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.singles.len()
    }

    // ── Delivery ─────────────────────────────────────────────────────

    /// Route one inbound reply.
    ///
    /// INITIAL and ERROR replies resolve (and remove) the single-reply
    /// entry for their correlation id; a second terminal reply for the
    /// same id finds no entry and is dropped. EVENT replies go to the
    /// streaming callback under their subscription id.
    pub fn complete(&self, reply: Reply) {
        match reply.tag {
            ReplyTag::Initial | ReplyTag::Error => {
                match self.singles.remove(&reply.correlation_id) {
                    Some((id, tx)) => {
                        if tx.send(reply).is_err() {
                            debug!(correlation_id = %id, "single-reply receiver dropped");
                        }
                    }
                    None => {
                        debug!(
                            correlation_id = %reply.correlation_id,
                            tag = ?reply.tag,
                            "dropping duplicate or unknown terminal reply"
                        );
                    }
                }
            }
            ReplyTag::Event => {
                let Some(subscription_id) = reply.subscription_id else {
                    warn!(
                        correlation_id = %reply.correlation_id,
                        "EVENT reply without subscription id"
                    );
                    return;
                };
                // Clone the callback out of the shard before invoking it
                // so delivery never runs under the map lock.
                let callback = self
                    .streams
                    .get(&subscription_id)
                    .map(|entry| Arc::clone(entry.value()));
                match callback {
                    Some(callback) => callback(reply),
                    None => {
                        debug!(
                            subscription_id = %subscription_id,
                            "dropping event for unknown or cancelled subscription"
                        );
                    }
                }
            }
        }
    }
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplySink for CorrelationRegistry {
    fn deliver(&self, reply: Reply) {
        self.complete(reply);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn single_reply_resolves_once_and_removes_entry() {
        let registry = CorrelationRegistry::new();
        let correlation_id = CorrelationId::new();
        let mut rx = registry.register_single(correlation_id);
        assert_eq!(registry.pending_count(), 1);

        registry.complete(Reply::initial(correlation_id, None, json!({"n": 1})));
        assert_eq!(registry.pending_count(), 0);

        let reply = rx.try_recv().expect("resolved");
        assert_eq!(reply.body, json!({"n": 1}));
    }

    #[tokio::test]
    async fn duplicate_terminal_reply_is_dropped() {
        let registry = CorrelationRegistry::new();
        let correlation_id = CorrelationId::new();
        let mut rx = registry.register_single(correlation_id);

        registry.complete(Reply::initial(correlation_id, None, json!(1)));
        // Redelivery of the same correlation id: silently dropped.
        registry.complete(Reply::initial(correlation_id, None, json!(2)));

        let reply = rx.try_recv().expect("first reply");
        assert_eq!(reply.body, json!(1));
        assert!(rx.try_recv().is_err(), "second reply leaked");
    }

    #[tokio::test]
    async fn error_reply_resolves_single_handle() {
        let registry = CorrelationRegistry::new();
        let correlation_id = CorrelationId::new();
        let mut rx = registry.register_single(correlation_id);

        registry.complete(Reply::error(correlation_id, None, "boom"));
        let reply = rx.try_recv().expect("resolved");
        assert_eq!(reply.tag, ReplyTag::Error);
    }

    #[tokio::test]
    async fn events_forward_until_cancelled() {
        let registry = CorrelationRegistry::new();
        let subscription_id = SubscriptionId::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        registry.register_stream(
            subscription_id,
            Arc::new(move |reply| {
                if let Ok(mut guard) = sink.lock() {
                    guard.push(reply.body);
                }
            }),
        );
        assert_eq!(registry.streaming_count(), 1);

        registry.complete(Reply::event(CorrelationId::new(), subscription_id, json!(1)));
        registry.complete(Reply::event(CorrelationId::new(), subscription_id, json!(2)));

        assert!(registry.cancel_stream(&subscription_id));
        assert!(!registry.cancel_stream(&subscription_id), "cancel is idempotent");
        assert_eq!(registry.streaming_count(), 0);

        // Late event after cancellation: dropped.
        registry.complete(Reply::event(CorrelationId::new(), subscription_id, json!(3)));

        let seen = seen.lock().expect("lock");
        assert_eq!(*seen, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn event_for_unknown_subscription_is_dropped() {
        let registry = CorrelationRegistry::new();
        // No panic, no error.
        registry.complete(Reply::event(
            CorrelationId::new(),
            SubscriptionId::new(),
            json!({}),
        ));
    }
}
