// devlink-core: subscription/dispatch engine over a partitioned transport.
//
// One logical subscription fans out into N per-target requests sharing a
// subscription id; initial results fan in through a barrier while push
// events flow to the caller's callback until explicit unsubscribe. All
// access decisions run synchronously before any transport call.

pub mod access;
pub mod config;
pub mod correlation;
pub mod directory;
pub mod dispatch;
pub mod error;
pub mod fanout;
pub mod model;
pub mod registry;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::DispatchConfig;
pub use correlation::{CorrelationRegistry, EventCallback};
pub use directory::{DeviceDirectory, DeviceRecord, MemoryDirectory};
pub use dispatch::{Dispatcher, action};
pub use error::DispatchError;
pub use fanout::{ChannelKind, FanoutCoordinator, InitialResults};
pub use registry::{SubscriptionEntry, SubscriptionRegistry};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    DeviceCommand, DeviceId, DeviceNotification, DevicePrincipal, FilterSpec, KeyPrincipal,
    NetworkId, OAuthClientPrincipal, Permission, Principal, SubscriptionState, TargetSet,
    UserPrincipal, UserRole,
};

// Wire-level ids come from the transport layer.
pub use devlink_transport::{CorrelationId, SubscriptionId};
