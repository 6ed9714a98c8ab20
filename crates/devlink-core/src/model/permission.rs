// ── Permission rules ──
//
// One allow-rule with five optional dimension sets. The Option is
// load-bearing: `None` means the dimension is unrestricted (wildcard),
// `Some(empty)` means the rule allows nothing on that dimension. The
// two must never collapse into each other -- including through serde,
// which is why none of the fields carry `skip_serializing_if`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::ids::{DeviceId, NetworkId};

/// A single allow-rule scoping a principal's reach.
///
/// Overall access on a dimension is the logical OR across all of the
/// principal's rules; see [`crate::access`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub domains: Option<HashSet<String>>,
    pub subnets: Option<HashSet<String>>,
    pub actions: Option<HashSet<String>>,
    pub network_ids: Option<HashSet<NetworkId>>,
    pub device_ids: Option<HashSet<DeviceId>>,
}

impl Permission {
    /// A rule with every dimension unrestricted.
    #[must_use]
    pub fn wildcard() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = Some(actions.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_networks<I>(mut self, networks: I) -> Self
    where
        I: IntoIterator<Item = NetworkId>,
    {
        self.network_ids = Some(networks.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_devices<I, D>(mut self, devices: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<DeviceId>,
    {
        self.device_ids = Some(devices.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = Some(domains.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_subnets<I, S>(mut self, subnets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subnets = Some(subnets.into_iter().map(Into::into).collect());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_rule_serializes_dimensions_as_null() {
        let json = serde_json::to_value(Permission::wildcard()).expect("serialize");
        assert_eq!(json["deviceIds"], serde_json::Value::Null);
        assert_eq!(json["networkIds"], serde_json::Value::Null);
        assert_eq!(json["actions"], serde_json::Value::Null);
    }

    #[test]
    fn null_and_empty_survive_round_trip_distinct() {
        let rule = Permission::wildcard().with_devices(Vec::<DeviceId>::new());
        let json = serde_json::to_string(&rule).expect("serialize");
        let back: Permission = serde_json::from_str(&json).expect("deserialize");

        // Present-but-empty stays empty, absent stays absent.
        assert_eq!(back.device_ids, Some(HashSet::new()));
        assert_eq!(back.network_ids, None);
        assert_eq!(back, rule);
    }

    #[test]
    fn deserializes_missing_fields_as_wildcard() {
        let rule: Permission = serde_json::from_str(r#"{"networkIds":[5]}"#).expect("parse");
        assert_eq!(
            rule.network_ids,
            Some([NetworkId::new(5)].into_iter().collect())
        );
        assert_eq!(rule.device_ids, None);
        assert_eq!(rule.actions, None);
    }
}
