// ── Notification records ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::DeviceId;

/// An event emitted by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceNotification {
    /// Backend-assigned identifier; `None` until persisted.
    #[serde(default)]
    pub id: Option<i64>,

    pub notification: String,

    #[serde(default)]
    pub parameters: Option<serde_json::Value>,

    #[serde(default)]
    pub device_id: Option<DeviceId>,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl DeviceNotification {
    pub fn new(notification: impl Into<String>) -> Self {
        Self {
            id: None,
            notification: notification.into(),
            parameters: None,
            device_id: None,
            timestamp: None,
        }
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = Some(parameters);
        self
    }
}
