// ── Domain model ──
//
// Principals, permissions, command/notification records, and
// subscription filter types. Serde representations preserve the
// null-vs-empty-set distinction that authorization depends on.

mod command;
mod ids;
mod notification;
mod permission;
mod principal;
mod subscription;

pub use command::DeviceCommand;
pub use ids::{DeviceId, NetworkId};
pub use notification::DeviceNotification;
pub use permission::Permission;
pub use principal::{
    DevicePrincipal, KeyPrincipal, OAuthClientPrincipal, Principal, UserPrincipal, UserRole,
};
pub use subscription::{FilterSpec, SubscriptionState, TargetSet};
