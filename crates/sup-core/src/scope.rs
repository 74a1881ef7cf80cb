//! Callback registration scopes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{EntityKey, InterfaceName, NetworkId};

/// Granularity at which an observer registers for events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Scope {
    /// Supplicant-wide events (interfaces appearing and disappearing).
    Global,

    /// Events for one interface.
    Interface { ifname: InterfaceName },

    /// Events for one network of one interface.
    Network {
        ifname: InterfaceName,
        network_id: NetworkId,
    },
}

impl Scope {
    pub fn interface(ifname: InterfaceName) -> Self {
        Self::Interface { ifname }
    }

    pub fn network(ifname: InterfaceName, network_id: NetworkId) -> Self {
        Self::Network { ifname, network_id }
    }

    /// Key of the entity this scope is attached to (`None` for `Global`).
    pub fn entity_key(&self) -> Option<EntityKey> {
        match self {
            Self::Global => None,
            Self::Interface { ifname } => Some(EntityKey::interface(ifname)),
            Self::Network { ifname, network_id } => Some(EntityKey::network(ifname, *network_id)),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Interface { ifname } => write!(f, "interface:{ifname}"),
            Self::Network { ifname, network_id } => write!(f, "network:{ifname}/{network_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_entity_key() {
        let wlan0 = InterfaceName::new("wlan0").unwrap();

        assert_eq!(Scope::Global.entity_key(), None);
        assert_eq!(
            Scope::interface(wlan0.clone()).entity_key(),
            Some(EntityKey::interface(&wlan0))
        );
        assert_eq!(
            Scope::network(wlan0.clone(), NetworkId::new(1)).entity_key(),
            Some(EntityKey::network(&wlan0, NetworkId::new(1)))
        );
    }

    #[test]
    fn test_scope_display() {
        let wlan0 = InterfaceName::new("wlan0").unwrap();
        assert_eq!(Scope::Global.to_string(), "global");
        assert_eq!(Scope::interface(wlan0.clone()).to_string(), "interface:wlan0");
        assert_eq!(
            Scope::network(wlan0, NetworkId::new(2)).to_string(),
            "network:wlan0/2"
        );
    }

    #[test]
    fn test_scope_serialization() {
        let scope = Scope::network(InterfaceName::new("wlan0").unwrap(), NetworkId::new(2));
        let json = serde_json::to_value(&scope).unwrap();
        assert_eq!(json["scope"], "network");
        assert_eq!(json["ifname"], "wlan0");
        assert_eq!(json["network_id"], 2);

        let back: Scope = serde_json::from_value(json).unwrap();
        assert_eq!(back, scope);
    }
}
