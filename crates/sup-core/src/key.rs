//! Flattened registry keys for exposed entities.
//!
//! Interfaces are keyed by their name. Networks are keyed by
//! `"<ifname>/<id>"` with the id in canonical decimal. Because
//! [`InterfaceName`] rejects `/`, the mapping is injective: two different
//! (interface, network) pairs never share a key, and no network key equals
//! an interface key.

use std::fmt;

use serde::Serialize;

use crate::{InterfaceName, NetworkId};

/// Separator between the interface name and the network id in network keys.
pub const KEY_SEPARATOR: char = '/';

/// What kind of entity a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Interface,
    Network,
}

/// Registry key of an interface or network proxy.
///
/// Only constructible through [`EntityKey::interface`] and
/// [`EntityKey::network`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn interface(ifname: &InterfaceName) -> Self {
        Self(ifname.as_str().to_string())
    }

    pub fn network(ifname: &InterfaceName, network_id: NetworkId) -> Self {
        Self(format!("{}{}{}", ifname.as_str(), KEY_SEPARATOR, network_id.get()))
    }

    pub fn kind(&self) -> EntityKind {
        if self.0.contains(KEY_SEPARATOR) {
            EntityKind::Network
        } else {
            EntityKind::Interface
        }
    }

    /// Returns true if this is a network key belonging to `ifname`.
    pub fn is_network_of(&self, ifname: &InterfaceName) -> bool {
        self.0
            .strip_prefix(ifname.as_str())
            .is_some_and(|rest| rest.starts_with(KEY_SEPARATOR))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EntityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn ifname(name: &str) -> InterfaceName {
        InterfaceName::new(name).unwrap()
    }

    #[test]
    fn test_key_format() {
        assert_eq!(EntityKey::interface(&ifname("wlan0")).as_str(), "wlan0");
        assert_eq!(
            EntityKey::network(&ifname("wlan0"), NetworkId::new(12)).as_str(),
            "wlan0/12"
        );
    }

    #[test]
    fn test_key_kind() {
        assert_eq!(EntityKey::interface(&ifname("wlan0")).kind(), EntityKind::Interface);
        assert_eq!(
            EntityKey::network(&ifname("wlan0"), NetworkId::new(0)).kind(),
            EntityKind::Network
        );
    }

    #[test]
    fn test_network_keys_are_injective() {
        // Names chosen so that naive "name_id" or "nameid" encodings collide.
        let names = ["wlan", "wlan0", "wlan1", "wlan_1", "wlan01", "w", "p2p-wlan0"];
        let ids = [0u32, 1, 2, 10, 11, 101, u32::MAX];

        let mut seen = HashSet::new();
        let mut interface_keys = HashSet::new();
        for name in names {
            interface_keys.insert(EntityKey::interface(&ifname(name)));
            for id in ids {
                let key = EntityKey::network(&ifname(name), NetworkId::new(id));
                assert!(seen.insert(key.clone()), "duplicate key {key}");
            }
        }

        for key in &seen {
            assert!(!interface_keys.contains(key), "{key} collides with an interface key");
            // No network key is a valid interface name at all.
            assert!(InterfaceName::new(key.as_str()).is_err());
        }
    }

    #[test]
    fn test_is_network_of() {
        let wlan0 = ifname("wlan0");
        let wlan = ifname("wlan");

        let key = EntityKey::network(&wlan0, NetworkId::new(1));
        assert!(key.is_network_of(&wlan0));
        assert!(!key.is_network_of(&wlan));
        assert!(!EntityKey::interface(&wlan0).is_network_of(&wlan0));
    }
}
