// ── Fan-out coordinator ──
//
// Turns one logical subscribe into N per-target requests sharing a
// single subscription id, with a fan-in barrier over the initial
// replies and indefinite event forwarding afterwards. The barrier is
// rendered as "join N oneshot futures, then merge" on a spawned task:
// it resolves exactly once, fails fast on the first per-target error,
// and keeps running even when the caller abandons the result receiver
// -- only explicit unsubscribe tears a subscription down.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use devlink_transport::{
    CorrelationId, Reply, ReplyTag, Request, SubscriptionId, Transport, TransportError,
};

use crate::correlation::{CorrelationRegistry, EventCallback};
use crate::error::DispatchError;
use crate::model::{DeviceId, FilterSpec, TargetSet};
use crate::registry::SubscriptionRegistry;

/// Which logical channel a subscription listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Command,
    Notification,
}

impl ChannelKind {
    #[must_use]
    pub fn subscribe_action(self) -> &'static str {
        match self {
            Self::Command => "command/subscribe",
            Self::Notification => "notification/subscribe",
        }
    }

    #[must_use]
    pub fn unsubscribe_action(self) -> &'static str {
        match self {
            Self::Command => "command/unsubscribe",
            Self::Notification => "notification/unsubscribe",
        }
    }
}

/// Receiver for the merged initial result collection of one fan-out.
/// Dropping it does NOT cancel the subscription.
pub type InitialResults = oneshot::Receiver<Result<Vec<serde_json::Value>, DispatchError>>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribePayload<'a> {
    action: &'static str,
    subscription_id: SubscriptionId,
    device_id: Option<&'a DeviceId>,
    names: Option<&'a HashSet<String>>,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnsubscribePayload<'a> {
    action: &'static str,
    subscription_id: SubscriptionId,
    device_id: Option<&'a DeviceId>,
}

/// Issues per-target requests and aggregates their replies.
///
/// Cheaply cloneable; clones share the same registries and transport.
#[derive(Clone)]
pub struct FanoutCoordinator {
    transport: Arc<dyn Transport>,
    correlation: Arc<CorrelationRegistry>,
    registry: Arc<SubscriptionRegistry>,
}

impl FanoutCoordinator {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        correlation: Arc<CorrelationRegistry>,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            transport,
            correlation,
            registry,
        }
    }

    // ── Subscribe ────────────────────────────────────────────────────

    /// Open one logical subscription over every lane of
    /// `filter.targets`.
    ///
    /// Registration order matters: the streaming handle is installed
    /// before the first request leaves, so an EVENT racing the INITIAL
    /// replies is forwarded immediately -- barrier state is not a
    /// delivery gate.
    pub fn subscribe(
        &self,
        kind: ChannelKind,
        filter: FilterSpec,
        on_event: EventCallback,
    ) -> Result<(SubscriptionId, InitialResults), DispatchError> {
        let subscription_id = SubscriptionId::new();
        let lanes = filter.targets.lanes();
        let names = filter.names.clone();
        let since = filter.since;

        self.registry.put(subscription_id, filter, on_event);

        // Delivery re-checks the registry per event: once the id is
        // removed, late events fall through to a debug log instead of a
        // stale callback.
        let registry = Arc::clone(&self.registry);
        self.correlation.register_stream(
            subscription_id,
            Arc::new(move |reply: Reply| match registry.get(&subscription_id) {
                Some(entry) => entry.notify(reply),
                None => {
                    debug!(
                        subscription_id = %subscription_id,
                        "dropping late event for cancelled subscription"
                    );
                }
            }),
        );

        let mut receivers = Vec::with_capacity(lanes.len());
        let mut correlation_ids = Vec::with_capacity(lanes.len());

        for lane in &lanes {
            let correlation_id = CorrelationId::new();
            let payload = SubscribePayload {
                action: kind.subscribe_action(),
                subscription_id,
                device_id: lane.as_ref(),
                names: names.as_ref(),
                timestamp: since,
            };
            let body = match serde_json::to_value(&payload).map_err(TransportError::from) {
                Ok(body) => body,
                Err(err) => {
                    self.abort_subscribe(subscription_id, &correlation_ids);
                    return Err(err.into());
                }
            };

            receivers.push(self.correlation.register_single(correlation_id));
            correlation_ids.push(correlation_id);

            let request = Request {
                correlation_id,
                subscription_id: Some(subscription_id),
                partition_key: lane.as_ref().map(|id| id.as_str().to_owned()),
                single_reply: false,
                body,
            };
            if let Err(err) = self.transport.send(request) {
                // Fail-fast: one lane failing to send fails the whole
                // subscribe, and nothing stays registered.
                self.abort_subscribe(subscription_id, &correlation_ids);
                return Err(err.into());
            }
        }

        debug!(
            subscription_id = %subscription_id,
            lanes = lanes.len(),
            action = kind.subscribe_action(),
            "fan-out subscribe sent"
        );

        let (result_tx, result_rx) = oneshot::channel();
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            let result = Self::join_initials(receivers).await;
            if result.is_ok() {
                registry.mark_active(&subscription_id);
            }
            if result_tx.send(result).is_err() {
                // Caller abandoned the wait; the subscription stays live.
                debug!(subscription_id = %subscription_id, "initial results receiver dropped");
            }
        });

        Ok((subscription_id, result_rx))
    }

    /// Fan-in barrier: resolves once, after every lane's terminal reply,
    /// failing fast on the first ERROR.
    async fn join_initials(
        receivers: Vec<oneshot::Receiver<Reply>>,
    ) -> Result<Vec<serde_json::Value>, DispatchError> {
        let replies = try_join_all(receivers.into_iter().map(|rx| async move {
            match rx.await {
                Ok(reply) if reply.tag == ReplyTag::Error => Err(DispatchError::Backend {
                    message: reply.error_message(),
                }),
                Ok(reply) => Ok(reply),
                Err(_) => Err(DispatchError::EngineStopped),
            }
        }))
        .await?;

        // Merge the per-lane collections. Membership is guaranteed,
        // order across lanes is not.
        let mut merged = Vec::new();
        for reply in replies {
            match reply.body {
                serde_json::Value::Array(items) => merged.extend(items),
                serde_json::Value::Null => {}
                other => merged.push(other),
            }
        }
        Ok(merged)
    }

    fn abort_subscribe(&self, subscription_id: SubscriptionId, correlation_ids: &[CorrelationId]) {
        for correlation_id in correlation_ids {
            self.correlation.cancel_single(correlation_id);
        }
        self.correlation.cancel_stream(&subscription_id);
        self.registry.remove(&subscription_id);
    }

    // ── Unsubscribe ──────────────────────────────────────────────────

    /// Cancel a subscription: one one-way message per affected lane
    /// (or one broadcast), then drop the streaming handle. Unknown or
    /// already-cancelled ids are a successful no-op, supporting
    /// idempotent client retries.
    pub fn unsubscribe(
        &self,
        kind: ChannelKind,
        subscription_id: SubscriptionId,
        targets: Option<TargetSet>,
    ) -> Result<(), DispatchError> {
        let Some(entry) = self.registry.remove(&subscription_id) else {
            debug!(subscription_id = %subscription_id, "unsubscribe for unknown id (no-op)");
            return Ok(());
        };
        self.correlation.cancel_stream(&subscription_id);

        let targets = targets.unwrap_or_else(|| entry.filter.targets.clone());
        for lane in targets.lanes() {
            let payload = UnsubscribePayload {
                action: kind.unsubscribe_action(),
                subscription_id,
                device_id: lane.as_ref(),
            };
            let body = serde_json::to_value(&payload).map_err(TransportError::from)?;
            let request = Request {
                correlation_id: CorrelationId::new(),
                subscription_id: Some(subscription_id),
                partition_key: lane.as_ref().map(|id| id.as_str().to_owned()),
                single_reply: false,
                body,
            };
            // Local cancellation already happened; a lane that cannot
            // take the cancel message only costs the backend a stale
            // server-side entry, so log and keep going.
            if let Err(err) = self.transport.send_one_way(request) {
                warn!(
                    subscription_id = %subscription_id,
                    lane = ?lane,
                    error = %err,
                    "unsubscribe message not delivered"
                );
            }
        }

        debug!(subscription_id = %subscription_id, "unsubscribed");
        Ok(())
    }
}
