// ── Principals ──
//
// The identity issuing a request: a logged-in user, a device speaking
// for itself, an access key, an OAuth client grant, or nobody at all.
// Variant-specific data lives on the variant; the matcher consumes the
// narrow capability surface exposed by the accessor methods below.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::ids::{DeviceId, NetworkId};
use super::permission::Permission;

/// Role attached to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Administrators pass every access check unconditionally.
    Admin,
    Client,
}

/// A logged-in user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPrincipal {
    pub user_id: i64,
    pub role: UserRole,
    /// Networks the account is an actual member of.
    pub member_networks: HashSet<NetworkId>,
    pub permissions: Vec<Permission>,
}

/// A device acting on its own behalf. Reaches only itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePrincipal {
    pub device_id: DeviceId,
    pub network_id: Option<NetworkId>,
}

/// An access key issued by a user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPrincipal {
    pub key_id: i64,
    /// Owning user account; network membership is inherited from it.
    pub user_id: i64,
    pub member_networks: HashSet<NetworkId>,
    pub permissions: Vec<Permission>,
    /// Key-level scoping: when present, the key reaches only these
    /// networks regardless of its permission rules.
    pub permitted_networks: Option<HashSet<NetworkId>>,
    /// Key-level scoping: when present, the key reaches only these
    /// devices regardless of its permission rules.
    pub permitted_devices: Option<HashSet<DeviceId>>,
}

/// An OAuth client grant. Scoped like an access key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthClientPrincipal {
    pub client_id: i64,
    pub user_id: i64,
    pub member_networks: HashSet<NetworkId>,
    pub permissions: Vec<Permission>,
    pub permitted_networks: Option<HashSet<NetworkId>>,
    pub permitted_devices: Option<HashSet<DeviceId>>,
}

/// The authenticated or anonymous identity issuing a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Principal {
    User(UserPrincipal),
    Device(DevicePrincipal),
    Key(KeyPrincipal),
    OAuthClient(OAuthClientPrincipal),
    Anonymous,
}

impl Principal {
    // ── Convenience constructors ─────────────────────────────────────

    /// An administrator account: passes every check.
    #[must_use]
    pub fn admin(user_id: i64) -> Self {
        Self::User(UserPrincipal {
            user_id,
            role: UserRole::Admin,
            member_networks: HashSet::new(),
            permissions: Vec::new(),
        })
    }

    /// A regular client account with the given memberships and rules.
    #[must_use]
    pub fn client(
        user_id: i64,
        member_networks: impl IntoIterator<Item = NetworkId>,
        permissions: Vec<Permission>,
    ) -> Self {
        Self::User(UserPrincipal {
            user_id,
            role: UserRole::Client,
            member_networks: member_networks.into_iter().collect(),
            permissions,
        })
    }

    // ── Capability surface ───────────────────────────────────────────

    /// `true` for principals that bypass permission matching entirely.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            Self::User(UserPrincipal {
                role: UserRole::Admin,
                ..
            })
        )
    }

    /// The principal's permission rules. Devices and anonymous callers
    /// have none -- their access is decided structurally.
    #[must_use]
    pub fn permissions(&self) -> &[Permission] {
        match self {
            Self::User(p) => &p.permissions,
            Self::Key(p) => &p.permissions,
            Self::OAuthClient(p) => &p.permissions,
            Self::Device(_) | Self::Anonymous => &[],
        }
    }

    /// Networks the owning identity is an actual member of.
    #[must_use]
    pub fn member_networks(&self) -> Option<&HashSet<NetworkId>> {
        match self {
            Self::User(p) => Some(&p.member_networks),
            Self::Key(p) => Some(&p.member_networks),
            Self::OAuthClient(p) => Some(&p.member_networks),
            Self::Device(_) | Self::Anonymous => None,
        }
    }

    /// Principal-level network scoping set; absent means unrestricted
    /// by the principal's own scoping.
    #[must_use]
    pub fn permitted_networks(&self) -> Option<&HashSet<NetworkId>> {
        match self {
            Self::Key(p) => p.permitted_networks.as_ref(),
            Self::OAuthClient(p) => p.permitted_networks.as_ref(),
            Self::User(_) | Self::Device(_) | Self::Anonymous => None,
        }
    }

    /// Principal-level device scoping set; absent means unrestricted
    /// by the principal's own scoping.
    #[must_use]
    pub fn permitted_devices(&self) -> Option<&HashSet<DeviceId>> {
        match self {
            Self::Key(p) => p.permitted_devices.as_ref(),
            Self::OAuthClient(p) => p.permitted_devices.as_ref(),
            Self::User(_) | Self::Device(_) | Self::Anonymous => None,
        }
    }

    /// The user account behind this principal, for ownership stamping.
    #[must_use]
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::User(p) => Some(p.user_id),
            Self::Key(p) => Some(p.user_id),
            Self::OAuthClient(p) => Some(p.user_id),
            Self::Device(_) | Self::Anonymous => None,
        }
    }
}
