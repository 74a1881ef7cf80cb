//! Domain-specific error types following panic-free policy.

use crate::{InterfaceName, NetworkId};
use thiserror::Error;

/// Errors raised while constructing domain values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Interface name failed validation
    #[error("Invalid interface name {name:?}: {reason}")]
    InvalidInterfaceName { name: String, reason: &'static str },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Failures reported by the daemon-internal entities.
///
/// Proxies hand these back to remote callers verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unknown interface: {0}")]
    UnknownInterface(InterfaceName),

    #[error("Interface already exists: {0}")]
    InterfaceExists(InterfaceName),

    #[error("Unknown network {network_id} on {ifname}")]
    UnknownNetwork {
        ifname: InterfaceName,
        network_id: NetworkId,
    },

    /// SSIDs are at most 32 octets
    #[error("Invalid SSID length: {0} (max 32)")]
    InvalidSsid(usize),

    /// Every network id on the interface has been handed out
    #[error("Network ids exhausted on {0}")]
    NetworkIdsExhausted(InterfaceName),

    #[error("Operation rejected: {0}")]
    Rejected(String),
}

/// Result type for daemon-internal entity operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_display() {
        let ifname = InterfaceName::new("wlan0").unwrap();

        let err = CoreError::UnknownNetwork {
            ifname: ifname.clone(),
            network_id: NetworkId::new(3),
        };
        assert_eq!(err.to_string(), "Unknown network 3 on wlan0");

        let err = CoreError::NetworkIdsExhausted(ifname.clone());
        assert_eq!(err.to_string(), "Network ids exhausted on wlan0");

        let err = CoreError::InterfaceExists(ifname);
        assert_eq!(err.to_string(), "Interface already exists: wlan0");

        let err = CoreError::InvalidSsid(40);
        assert_eq!(err.to_string(), "Invalid SSID length: 40 (max 32)");
    }

    #[test]
    fn test_domain_error_display() {
        let err = InterfaceName::new("wlan/0").unwrap_err();
        assert!(err.to_string().contains("wlan/0"));
    }
}
