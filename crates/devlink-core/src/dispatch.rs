// ── Dispatch facade ──
//
// Public entry point combining permission filtering with fan-out.
// Every access decision runs synchronously before the first transport
// call, so authorization and validation failures cost no network
// round trip.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use devlink_transport::{CorrelationId, ReplyTag, Request, SubscriptionId, Transport, TransportError};

use crate::access;
use crate::config::DispatchConfig;
use crate::correlation::{CorrelationRegistry, EventCallback};
use crate::directory::DeviceDirectory;
use crate::error::DispatchError;
use crate::fanout::{ChannelKind, FanoutCoordinator, InitialResults};
use crate::model::{
    DeviceCommand, DeviceId, DeviceNotification, FilterSpec, Principal, SubscriptionState,
    TargetSet,
};
use crate::registry::SubscriptionRegistry;

/// Action names checked against the principal's permission rules.
pub mod action {
    pub const COMMAND_INSERT: &str = "command/insert";
    pub const COMMAND_SUBSCRIBE: &str = "command/subscribe";
    pub const NOTIFICATION_INSERT: &str = "notification/insert";
    pub const NOTIFICATION_SUBSCRIBE: &str = "notification/subscribe";
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertPayload<'a, T: Serialize> {
    action: &'static str,
    device_id: &'a DeviceId,
    record: &'a T,
}

/// The engine facade.
///
/// Cheaply cloneable via `Arc` internals; all clones share registries,
/// directory, and transport.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    transport: Arc<dyn Transport>,
    directory: Arc<dyn DeviceDirectory>,
    correlation: Arc<CorrelationRegistry>,
    registry: Arc<SubscriptionRegistry>,
    fanout: FanoutCoordinator,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Wire up the engine.
    ///
    /// The caller constructs the [`CorrelationRegistry`] first and
    /// hands it to the transport as its reply sink, then passes the
    /// same instance here.
    pub fn new(
        transport: Arc<dyn Transport>,
        directory: Arc<dyn DeviceDirectory>,
        correlation: Arc<CorrelationRegistry>,
        config: DispatchConfig,
    ) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let fanout = FanoutCoordinator::new(
            Arc::clone(&transport),
            Arc::clone(&correlation),
            Arc::clone(&registry),
        );
        Self {
            inner: Arc::new(DispatcherInner {
                transport,
                directory,
                correlation,
                registry,
                fanout,
                config,
            }),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Submit a command to one device and await the persisted echo.
    pub async fn submit_command(
        &self,
        device_id: &DeviceId,
        principal: &Principal,
        mut command: DeviceCommand,
    ) -> Result<DeviceCommand, DispatchError> {
        if command.command.trim().is_empty() {
            return Err(DispatchError::Validation {
                message: "command name must not be empty".into(),
            });
        }
        self.authorize_device(device_id, principal, action::COMMAND_INSERT)?;

        command.device_id = Some(device_id.clone());
        command.user_id = command.user_id.or_else(|| principal.user_id());
        command.timestamp.get_or_insert_with(Utc::now);

        let body = serde_json::to_value(&InsertPayload {
            action: action::COMMAND_INSERT,
            device_id,
            record: &command,
        })
        .map_err(TransportError::from)?;

        let reply = self.round_trip(device_id, body).await?;
        serde_json::from_value(reply).map_err(|err| {
            DispatchError::Internal(format!("malformed command echo: {err}"))
        })
    }

    /// Subscribe to command streams for the given devices (`None` =
    /// every device, as one broadcast request).
    pub fn subscribe_commands(
        &self,
        device_ids: Option<HashSet<DeviceId>>,
        names: Option<HashSet<String>>,
        since: Option<DateTime<Utc>>,
        principal: &Principal,
        on_event: EventCallback,
    ) -> Result<(SubscriptionId, InitialResults), DispatchError> {
        self.subscribe_channel(ChannelKind::Command, device_ids, names, since, principal, on_event)
    }

    /// Cancel a command subscription. Idempotent.
    pub fn unsubscribe_commands(
        &self,
        subscription_id: SubscriptionId,
        device_ids: Option<HashSet<DeviceId>>,
    ) -> Result<(), DispatchError> {
        self.inner.fanout.unsubscribe(
            ChannelKind::Command,
            subscription_id,
            device_ids.map(TargetSet::Devices),
        )
    }

    // ── Notifications ────────────────────────────────────────────────

    /// Submit a notification on behalf of one device and await the
    /// persisted echo.
    pub async fn submit_notification(
        &self,
        device_id: &DeviceId,
        principal: &Principal,
        mut notification: DeviceNotification,
    ) -> Result<DeviceNotification, DispatchError> {
        if notification.notification.trim().is_empty() {
            return Err(DispatchError::Validation {
                message: "notification name must not be empty".into(),
            });
        }
        self.authorize_device(device_id, principal, action::NOTIFICATION_INSERT)?;

        notification.device_id = Some(device_id.clone());
        notification.timestamp.get_or_insert_with(Utc::now);

        let body = serde_json::to_value(&InsertPayload {
            action: action::NOTIFICATION_INSERT,
            device_id,
            record: &notification,
        })
        .map_err(TransportError::from)?;

        let reply = self.round_trip(device_id, body).await?;
        serde_json::from_value(reply).map_err(|err| {
            DispatchError::Internal(format!("malformed notification echo: {err}"))
        })
    }

    /// Subscribe to notification streams for the given devices.
    pub fn subscribe_notifications(
        &self,
        device_ids: Option<HashSet<DeviceId>>,
        names: Option<HashSet<String>>,
        since: Option<DateTime<Utc>>,
        principal: &Principal,
        on_event: EventCallback,
    ) -> Result<(SubscriptionId, InitialResults), DispatchError> {
        self.subscribe_channel(
            ChannelKind::Notification,
            device_ids,
            names,
            since,
            principal,
            on_event,
        )
    }

    /// Cancel a notification subscription. Idempotent.
    pub fn unsubscribe_notifications(
        &self,
        subscription_id: SubscriptionId,
        device_ids: Option<HashSet<DeviceId>>,
    ) -> Result<(), DispatchError> {
        self.inner.fanout.unsubscribe(
            ChannelKind::Notification,
            subscription_id,
            device_ids.map(TargetSet::Devices),
        )
    }

    // ── Administrative surface ───────────────────────────────────────

    /// Filter specs for the requested subscription ids; unknown ids are
    /// absent from the result.
    #[must_use]
    pub fn list_active_subscriptions(
        &self,
        ids: &[SubscriptionId],
    ) -> HashMap<SubscriptionId, FilterSpec> {
        self.inner.registry.list(ids)
    }

    #[must_use]
    pub fn subscription_state(&self, id: &SubscriptionId) -> Option<SubscriptionState> {
        self.inner.registry.get(id).map(|entry| entry.state())
    }

    /// Live streaming handle count, for diagnostics.
    #[must_use]
    pub fn streaming_count(&self) -> usize {
        self.inner.correlation.streaming_count()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn authorize_device(
        &self,
        device_id: &DeviceId,
        principal: &Principal,
        action_name: &str,
    ) -> Result<(), DispatchError> {
        let record = self.inner.directory.device(device_id).ok_or_else(|| {
            DispatchError::DeviceNotFound {
                device_id: device_id.to_string(),
            }
        })?;

        if !access::allows_action(principal, action_name)
            || !access::has_device_access(principal, device_id, record.network_id.as_ref())
        {
            return Err(DispatchError::Unauthorized {
                message: format!("no access to device {device_id} for {action_name}"),
            });
        }
        Ok(())
    }

    /// Single-reply round trip keyed by the device's partition.
    async fn round_trip(
        &self,
        device_id: &DeviceId,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, DispatchError> {
        let correlation_id = CorrelationId::new();
        let rx = self.inner.correlation.register_single(correlation_id);

        let request = Request {
            correlation_id,
            subscription_id: None,
            partition_key: Some(device_id.as_str().to_owned()),
            single_reply: true,
            body,
        };
        if let Err(err) = self.inner.transport.send(request) {
            self.inner.correlation.cancel_single(&correlation_id);
            return Err(err.into());
        }

        let reply = rx.await.map_err(|_| DispatchError::EngineStopped)?;
        if reply.tag == ReplyTag::Error {
            return Err(DispatchError::Backend {
                message: reply.error_message(),
            });
        }
        Ok(reply.body)
    }

    fn subscribe_channel(
        &self,
        kind: ChannelKind,
        device_ids: Option<HashSet<DeviceId>>,
        names: Option<HashSet<String>>,
        since: Option<DateTime<Utc>>,
        principal: &Principal,
        on_event: EventCallback,
    ) -> Result<(SubscriptionId, InitialResults), DispatchError> {
        if !access::allows_action(principal, kind.subscribe_action()) {
            return Err(DispatchError::Unauthorized {
                message: format!("action {} not permitted", kind.subscribe_action()),
            });
        }

        let targets = match device_ids {
            Some(requested) => {
                let requested_count = requested.len();
                // Filter before any network call: only devices the
                // principal can actually reach survive.
                let accessible: HashSet<DeviceId> = requested
                    .into_iter()
                    .filter(|id| {
                        self.inner.directory.device(id).is_some_and(|record| {
                            access::has_device_access(principal, id, record.network_id.as_ref())
                        })
                    })
                    .collect();

                if accessible.is_empty() {
                    return Err(DispatchError::Unauthorized {
                        message: "no accessible devices among requested targets".into(),
                    });
                }
                if accessible.len() > self.inner.config.max_fanout_targets {
                    return Err(DispatchError::Validation {
                        message: format!(
                            "{} targets exceed the fan-out limit of {}",
                            accessible.len(),
                            self.inner.config.max_fanout_targets
                        ),
                    });
                }
                if accessible.len() < requested_count {
                    debug!(
                        requested = requested_count,
                        accessible = accessible.len(),
                        "permission filter narrowed subscribe targets"
                    );
                }
                TargetSet::Devices(accessible)
            }
            None => {
                // Broadcast needs reach over every device on every
                // network.
                if !access::has_unrestricted_device_access(principal) {
                    return Err(DispatchError::Unauthorized {
                        message: "broadcast subscription requires unrestricted device access"
                            .into(),
                    });
                }
                TargetSet::All
            }
        };

        let filter = FilterSpec {
            targets,
            names,
            since,
        };
        let (subscription_id, results) = self.inner.fanout.subscribe(kind, filter, on_event)?;
        info!(subscription_id = %subscription_id, action = kind.subscribe_action(), "subscribed");
        Ok((subscription_id, results))
    }
}
