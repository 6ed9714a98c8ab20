// ── Subscription filter types ──

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::DeviceId;

/// The set of devices one logical subscription covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "deviceIds", rename_all = "camelCase")]
pub enum TargetSet {
    /// Every device: a single broadcast request with no partition key.
    All,
    /// Explicit per-device fan-out, one request per id.
    Devices(HashSet<DeviceId>),
}

impl TargetSet {
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Number of outbound requests this target set produces.
    #[must_use]
    pub fn fanout_width(&self) -> usize {
        match self {
            Self::All => 1,
            Self::Devices(ids) => ids.len(),
        }
    }

    /// The per-request lanes: `None` is the broadcast lane, `Some(id)`
    /// a device-keyed partition.
    #[must_use]
    pub fn lanes(&self) -> Vec<Option<DeviceId>> {
        match self {
            Self::All => vec![None],
            Self::Devices(ids) => ids.iter().cloned().map(Some).collect(),
        }
    }
}

/// Filter attached to a live subscription, exposed for administrative
/// listing. `names: None` means no name filtering -- the same
/// null-as-wildcard reading the permission model uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub targets: TargetSet,
    pub names: Option<HashSet<String>>,
    pub since: Option<DateTime<Utc>>,
}

/// Lifecycle of a subscription.
///
/// `Active` records only that the initial-fetch barrier has resolved;
/// it is never a delivery gate -- events arriving while still `Created`
/// are forwarded immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SubscriptionState {
    Created = 0,
    Active = 1,
    Cancelled = 2,
}

impl SubscriptionState {
    #[must_use]
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Active,
            2 => Self::Cancelled,
            _ => Self::Created,
        }
    }
}
