// ── Device directory seam ──
//
// The one persistence lookup the engine needs before touching the
// network: does this device exist, and which network does it live on?
// Full entity CRUD lives with the embedding application.

use dashmap::DashMap;

use crate::model::{DeviceId, NetworkId};

/// Directory record for a known device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub network_id: Option<NetworkId>,
}

/// Synchronous device lookup, called on the hot path before every
/// permission check. Implementations should answer from memory.
pub trait DeviceDirectory: Send + Sync {
    fn device(&self, id: &DeviceId) -> Option<DeviceRecord>;
}

/// DashMap-backed directory for tests and embedded setups.
#[derive(Default)]
pub struct MemoryDirectory {
    devices: DashMap<DeviceId, DeviceRecord>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<DeviceId>, network_id: Option<NetworkId>) {
        let id = id.into();
        self.devices.insert(
            id.clone(),
            DeviceRecord {
                id,
                network_id,
            },
        );
    }

    pub fn remove(&self, id: &DeviceId) {
        self.devices.remove(id);
    }
}

impl DeviceDirectory for MemoryDirectory {
    fn device(&self, id: &DeviceId) -> Option<DeviceRecord> {
        self.devices.get(id).map(|record| record.clone())
    }
}
