// ── Permission matcher ──
//
// Pure evaluation of principal access to devices, networks, and
// actions. Each dimension of each rule is read independently: an
// absent set is a wildcard, a present set either names the target
// (explicit allow) or does not apply. A dimension passes when any
// rule contributed a wildcard or an explicit allow; a principal with
// no rules at all is denied. Rules referencing ids that no longer
// exist simply never match -- never an error.

use std::collections::HashSet;
use std::hash::Hash;

use crate::model::{DeviceId, NetworkId, Permission, Principal};

/// Outcome of reading one dimension of one rule against a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DimensionMatch {
    /// Set absent: the rule is unrestricted on this dimension.
    Wildcard,
    /// Set present and it names the target.
    Allow,
    /// Set present but the target is not in it. Contributes nothing --
    /// neither allow nor deny.
    NotApplicable,
}

fn match_dimension<T: Eq + Hash>(set: Option<&HashSet<T>>, target: &T) -> DimensionMatch {
    match set {
        None => DimensionMatch::Wildcard,
        Some(s) if s.contains(target) => DimensionMatch::Allow,
        Some(_) => DimensionMatch::NotApplicable,
    }
}

/// OR across all rules for one dimension. Deny when there are no rules.
fn dimension_allows<T, F>(permissions: &[Permission], pick: F, target: &T) -> bool
where
    T: Eq + Hash,
    F: Fn(&Permission) -> Option<&HashSet<T>>,
{
    permissions
        .iter()
        .any(|rule| match_dimension(pick(rule), target) != DimensionMatch::NotApplicable)
}

/// `true` when every rule read gives a wildcard on this dimension for
/// at least one rule -- i.e. the principal is unrestricted there.
fn dimension_wildcard<T, F>(permissions: &[Permission], pick: F) -> bool
where
    T: Eq + Hash,
    F: Fn(&Permission) -> Option<&HashSet<T>>,
{
    permissions.iter().any(|rule| pick(rule).is_none())
}

// ── Device access ────────────────────────────────────────────────────

/// May `principal` touch `device_id` (which lives on
/// `device_network_id`, when known)?
///
/// Unknown ids evaluate to `false`; this function never fails.
#[must_use]
pub fn has_device_access(
    principal: &Principal,
    device_id: &DeviceId,
    device_network_id: Option<&NetworkId>,
) -> bool {
    if principal.is_privileged() {
        return true;
    }

    // A device principal reaches exactly itself.
    if let Principal::Device(own) = principal {
        return own.device_id == *device_id;
    }

    // Principal-level scoping sets, when present, bound everything the
    // permission rules could grant.
    if let Some(devices) = principal.permitted_devices() {
        if !devices.contains(device_id) {
            return false;
        }
    }
    if let Some(networks) = principal.permitted_networks() {
        match device_network_id {
            Some(network) if networks.contains(network) => {}
            _ => return false,
        }
    }

    let permissions = principal.permissions();
    let device_ok = dimension_allows(permissions, |p| p.device_ids.as_ref(), device_id);
    let network_ok = match device_network_id {
        Some(network) => dimension_allows(permissions, |p| p.network_ids.as_ref(), network),
        // A device without a network is reachable only through a
        // network-wildcard rule.
        None => dimension_wildcard(permissions, |p: &Permission| p.network_ids.as_ref()),
    };

    device_ok && network_ok
}

/// `true` when the principal may touch any device on any network:
/// required for broadcast (ALL-target) subscriptions.
#[must_use]
pub fn has_unrestricted_device_access(principal: &Principal) -> bool {
    if principal.is_privileged() {
        return true;
    }
    if matches!(principal, Principal::Device(_)) {
        return false;
    }
    if principal.permitted_devices().is_some() || principal.permitted_networks().is_some() {
        return false;
    }

    let permissions = principal.permissions();
    dimension_wildcard(permissions, |p: &Permission| p.device_ids.as_ref())
        && dimension_wildcard(permissions, |p: &Permission| p.network_ids.as_ref())
}

// ── Network access ───────────────────────────────────────────────────

/// May `principal` touch `network_id`?
///
/// Beyond the rule scan, non-privileged principals must be actual
/// members of the network -- an explicit allow-list entry does not
/// bypass membership.
#[must_use]
pub fn has_network_access(principal: &Principal, network_id: &NetworkId) -> bool {
    if principal.is_privileged() {
        return true;
    }

    if let Principal::Device(own) = principal {
        return own.network_id.as_ref() == Some(network_id);
    }

    if let Some(networks) = principal.permitted_networks() {
        if !networks.contains(network_id) {
            return false;
        }
    }

    let rules_allow =
        dimension_allows(principal.permissions(), |p| p.network_ids.as_ref(), network_id);
    let is_member = principal
        .member_networks()
        .is_some_and(|networks| networks.contains(network_id));

    rules_allow && is_member
}

// ── Action / domain / subnet access ──────────────────────────────────

/// May `principal` perform `action` (e.g. `command/insert`)?
#[must_use]
pub fn allows_action(principal: &Principal, action: &str) -> bool {
    if principal.is_privileged() {
        return true;
    }
    // Devices carry no rules; the actions they may perform are decided
    // by the facade per operation.
    if matches!(principal, Principal::Device(_)) {
        return true;
    }
    dimension_allows(
        principal.permissions(),
        |p| p.actions.as_ref(),
        &action.to_owned(),
    )
}

/// May `principal` be used from `domain`?
#[must_use]
pub fn allows_domain(principal: &Principal, domain: &str) -> bool {
    if principal.is_privileged() || matches!(principal, Principal::Device(_)) {
        return true;
    }
    dimension_allows(
        principal.permissions(),
        |p| p.domains.as_ref(),
        &domain.to_owned(),
    )
}

/// May `principal` be used from `subnet`?
#[must_use]
pub fn allows_subnet(principal: &Principal, subnet: &str) -> bool {
    if principal.is_privileged() || matches!(principal, Principal::Device(_)) {
        return true;
    }
    dimension_allows(
        principal.permissions(),
        |p| p.subnets.as_ref(),
        &subnet.to_owned(),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::model::{DevicePrincipal, KeyPrincipal, Permission};

    fn key_with(permissions: Vec<Permission>) -> Principal {
        Principal::Key(KeyPrincipal {
            key_id: 1,
            user_id: 10,
            member_networks: [NetworkId::new(5), NetworkId::new(7)].into_iter().collect(),
            permissions,
            permitted_networks: None,
            permitted_devices: None,
        })
    }

    #[test]
    fn admin_passes_unconditionally() {
        let admin = Principal::admin(1);
        assert!(has_device_access(&admin, &"anything".into(), None));
        assert!(has_network_access(&admin, &NetworkId::new(999)));
        assert!(allows_action(&admin, "command/insert"));
        assert!(has_unrestricted_device_access(&admin));
    }

    #[test]
    fn absent_dimension_is_wildcard_for_any_target() {
        let principal = key_with(vec![Permission::wildcard()]);
        assert!(has_device_access(&principal, &"d1".into(), None));
        assert!(has_device_access(
            &principal,
            &"d2".into(),
            Some(&NetworkId::new(42))
        ));
        assert!(allows_action(&principal, "any/action"));
    }

    #[test]
    fn empty_dimension_contributes_deny_never_wildcard() {
        let principal = key_with(vec![
            Permission::wildcard().with_devices(Vec::<DeviceId>::new()),
        ]);
        assert!(!has_device_access(&principal, &"d1".into(), None));
        // An empty action set on the only rule denies every action.
        let principal = key_with(vec![Permission::wildcard().with_actions(Vec::<String>::new())]);
        assert!(!allows_action(&principal, "command/insert"));
    }

    #[test]
    fn no_permissions_at_all_is_deny() {
        let principal = key_with(Vec::new());
        assert!(!has_device_access(&principal, &"d1".into(), None));
        assert!(!has_network_access(&principal, &NetworkId::new(5)));
        assert!(!allows_action(&principal, "command/insert"));
    }

    #[test]
    fn non_matching_rule_is_not_applicable_not_deny() {
        // Rule names d1 only; a second wildcard rule still grants d2.
        let principal = key_with(vec![
            Permission::wildcard().with_devices(["d1"]),
            Permission::wildcard(),
        ]);
        assert!(has_device_access(&principal, &"d2".into(), None));
    }

    #[test]
    fn device_dimension_and_network_dimension_both_required() {
        // deviceIds absent, networkIds {5}: device D on network 5 is
        // granted, D2 on network 7 is denied.
        let principal = key_with(vec![
            Permission::wildcard().with_networks([NetworkId::new(5)]),
        ]);
        assert!(has_device_access(
            &principal,
            &"D".into(),
            Some(&NetworkId::new(5))
        ));
        assert!(!has_device_access(
            &principal,
            &"D2".into(),
            Some(&NetworkId::new(7))
        ));
    }

    #[test]
    fn networkless_device_needs_network_wildcard() {
        let wildcard = key_with(vec![Permission::wildcard()]);
        assert!(has_device_access(&wildcard, &"d1".into(), None));

        let scoped = key_with(vec![
            Permission::wildcard().with_networks([NetworkId::new(5)]),
        ]);
        assert!(!has_device_access(&scoped, &"d1".into(), None));
    }

    #[test]
    fn network_access_requires_membership_even_with_explicit_allow() {
        // Network 9 is allowed by rule but the key's owner is not a
        // member of it.
        let principal = key_with(vec![
            Permission::wildcard().with_networks([NetworkId::new(9)]),
        ]);
        assert!(!has_network_access(&principal, &NetworkId::new(9)));

        // Network 5: allowed by wildcard and a real membership.
        let principal = key_with(vec![Permission::wildcard()]);
        assert!(has_network_access(&principal, &NetworkId::new(5)));
    }

    #[test]
    fn principal_scoping_sets_bound_rule_grants() {
        let mut base = match key_with(vec![Permission::wildcard()]) {
            Principal::Key(k) => k,
            _ => unreachable!(),
        };
        base.permitted_devices = Some(["d1".into()].into_iter().collect());
        let principal = Principal::Key(base.clone());

        assert!(has_device_access(&principal, &"d1".into(), None));
        assert!(!has_device_access(&principal, &"d2".into(), None));
        assert!(!has_unrestricted_device_access(&principal));

        base.permitted_devices = None;
        base.permitted_networks = Some(HashSet::new());
        let principal = Principal::Key(base);
        // Empty scoping set denies every network-bound target.
        assert!(!has_device_access(
            &principal,
            &"d1".into(),
            Some(&NetworkId::new(5))
        ));
        assert!(!has_network_access(&principal, &NetworkId::new(5)));
    }

    #[test]
    fn device_principal_reaches_only_itself() {
        let principal = Principal::Device(DevicePrincipal {
            device_id: "d1".into(),
            network_id: Some(NetworkId::new(5)),
        });
        assert!(has_device_access(&principal, &"d1".into(), None));
        assert!(!has_device_access(&principal, &"d2".into(), None));
        assert!(has_network_access(&principal, &NetworkId::new(5)));
        assert!(!has_network_access(&principal, &NetworkId::new(7)));
        assert!(!has_unrestricted_device_access(&principal));
    }

    #[test]
    fn anonymous_is_denied_everywhere() {
        let principal = Principal::Anonymous;
        assert!(!has_device_access(&principal, &"d1".into(), None));
        assert!(!has_network_access(&principal, &NetworkId::new(5)));
        assert!(!allows_action(&principal, "command/insert"));
    }

    #[test]
    fn unrestricted_access_needs_wildcards_on_both_dimensions() {
        assert!(has_unrestricted_device_access(&key_with(vec![
            Permission::wildcard()
        ])));
        assert!(!has_unrestricted_device_access(&key_with(vec![
            Permission::wildcard().with_networks([NetworkId::new(5)])
        ])));
        assert!(!has_unrestricted_device_access(&key_with(vec![
            Permission::wildcard().with_devices(["d1"])
        ])));
        assert!(!has_unrestricted_device_access(&key_with(Vec::new())));
    }

    #[test]
    fn domain_and_subnet_dimensions_follow_the_same_law() {
        let principal = key_with(vec![
            Permission::wildcard().with_domains(["example.com"]),
        ]);
        assert!(allows_domain(&principal, "example.com"));
        assert!(!allows_domain(&principal, "other.org"));
        // Subnet dimension left absent on the rule: wildcard.
        assert!(allows_subnet(&principal, "10.0.0.0/8"));
    }

    #[test]
    fn stale_rule_ids_evaluate_as_plain_non_matches() {
        // Rule references devices/networks that no longer exist
        // anywhere; evaluation still just returns false.
        let principal = key_with(vec![
            Permission::wildcard()
                .with_devices(["gone-device"])
                .with_networks([NetworkId::new(404)]),
        ]);
        assert!(!has_device_access(
            &principal,
            &"d1".into(),
            Some(&NetworkId::new(5))
        ));
    }
}
