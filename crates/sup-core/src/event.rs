//! Events delivered to observers, and the enums they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{InterfaceName, NetworkId, Scope};

/// Connection state of an interface, as tracked by the supplicant state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplicantState {
    #[default]
    Disconnected,
    InterfaceDisabled,
    Inactive,
    Scanning,
    Authenticating,
    Associating,
    Associated,
    FourWayHandshake,
    GroupHandshake,
    Completed,
}

impl SupplicantState {
    /// Returns true once the link is fully established.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Supplicant debug verbosity, most verbose first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DebugLevel {
    Excessive,
    MsgDump,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

/// Credentials a network asks its observer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkRequestKind {
    EapIdentity,
    EapPassword,
    SimAuth,
}

/// An event the daemon publishes to registered observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupplicantEvent {
    InterfaceCreated {
        ifname: InterfaceName,
    },
    InterfaceRemoved {
        ifname: InterfaceName,
    },
    NetworkAdded {
        ifname: InterfaceName,
        network_id: NetworkId,
    },
    NetworkRemoved {
        ifname: InterfaceName,
        network_id: NetworkId,
    },
    StateChanged {
        ifname: InterfaceName,
        state: SupplicantState,
        #[serde(skip_serializing_if = "Option::is_none")]
        bssid: Option<[u8; 6]>,
        #[serde(skip_serializing_if = "Option::is_none")]
        network_id: Option<NetworkId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        ssid: Option<Vec<u8>>,
    },
    NetworkRequest {
        ifname: InterfaceName,
        network_id: NetworkId,
        request: NetworkRequestKind,
    },
}

impl SupplicantEvent {
    /// The scope observers register under to receive this event.
    ///
    /// Interface lifecycle goes to global observers, network lifecycle and
    /// state changes to the owning interface, credential requests to the
    /// network itself.
    pub fn natural_scope(&self) -> Scope {
        match self {
            Self::InterfaceCreated { .. } | Self::InterfaceRemoved { .. } => Scope::Global,
            Self::NetworkAdded { ifname, .. }
            | Self::NetworkRemoved { ifname, .. }
            | Self::StateChanged { ifname, .. } => Scope::interface(ifname.clone()),
            Self::NetworkRequest {
                ifname, network_id, ..
            } => Scope::network(ifname.clone(), *network_id),
        }
    }
}

/// An event as handed to one observer: the scope it was published under
/// plus a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub scope: Scope,
    pub event: SupplicantEvent,
    pub emitted_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(scope: Scope, event: SupplicantEvent) -> Self {
        Self {
            scope,
            event,
            emitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wlan0() -> InterfaceName {
        InterfaceName::new("wlan0").unwrap()
    }

    #[test]
    fn test_natural_scope() {
        let created = SupplicantEvent::InterfaceCreated { ifname: wlan0() };
        assert_eq!(created.natural_scope(), Scope::Global);

        let added = SupplicantEvent::NetworkAdded {
            ifname: wlan0(),
            network_id: NetworkId::new(1),
        };
        assert_eq!(added.natural_scope(), Scope::interface(wlan0()));

        let request = SupplicantEvent::NetworkRequest {
            ifname: wlan0(),
            network_id: NetworkId::new(1),
            request: NetworkRequestKind::EapIdentity,
        };
        assert_eq!(
            request.natural_scope(),
            Scope::network(wlan0(), NetworkId::new(1))
        );
    }

    #[test]
    fn test_state_changed_serialization_skips_empty_fields() {
        let event = SupplicantEvent::StateChanged {
            ifname: wlan0(),
            state: SupplicantState::Scanning,
            bssid: None,
            network_id: None,
            ssid: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "state_changed");
        assert_eq!(json["state"], "scanning");
        assert!(json.get("bssid").is_none());
        assert!(json.get("ssid").is_none());
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = EventEnvelope::new(
            Scope::Global,
            SupplicantEvent::InterfaceRemoved { ifname: wlan0() },
        );
        let json = serde_json::to_string(&envelope).unwrap();
        let back: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_state_helpers() {
        assert!(SupplicantState::Completed.is_connected());
        assert!(!SupplicantState::Associated.is_connected());
        assert_eq!(SupplicantState::default(), SupplicantState::Disconnected);
        assert!(DebugLevel::Debug < DebugLevel::Error);
    }
}
