// ── Command records ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::DeviceId;

/// A command addressed to a device.
///
/// Built by the caller with [`DeviceCommand::new`]; the dispatch facade
/// stamps timestamp and ownership before sending, and the backend
/// echoes the persisted record (with its assigned id) back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCommand {
    /// Backend-assigned identifier; `None` until persisted.
    #[serde(default)]
    pub id: Option<i64>,

    pub command: String,

    #[serde(default)]
    pub parameters: Option<serde_json::Value>,

    #[serde(default)]
    pub device_id: Option<DeviceId>,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Issuing user account, stamped by the facade.
    #[serde(default)]
    pub user_id: Option<i64>,

    /// Seconds the command stays deliverable.
    #[serde(default)]
    pub lifetime: Option<i32>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl DeviceCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            id: None,
            command: command.into(),
            parameters: None,
            device_id: None,
            timestamp: None,
            user_id: None,
            lifetime: None,
            status: None,
            result: None,
        }
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = Some(parameters);
        self
    }
}
