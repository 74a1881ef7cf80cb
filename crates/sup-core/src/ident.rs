//! Stable identifiers for daemon entities.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::key::KEY_SEPARATOR;

/// Maximum interface name length in bytes (Linux `IFNAMSIZ` minus the NUL).
pub const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Name of a network interface managed by the supplicant (e.g. "wlan0").
///
/// Validated on construction: non-empty, at most
/// [`MAX_INTERFACE_NAME_LEN`] bytes, no whitespace, no NUL and no
/// [`KEY_SEPARATOR`]. The separator restriction is what keeps network
/// entity keys from colliding with interface keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InterfaceName(String);

impl InterfaceName {
    /// Creates a validated interface name.
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if let Some(reason) = Self::violation(&name) {
            return Err(DomainError::InvalidInterfaceName { name, reason });
        }
        Ok(Self(name))
    }

    fn violation(name: &str) -> Option<&'static str> {
        if name.is_empty() {
            return Some("name is empty");
        }
        if name.len() > MAX_INTERFACE_NAME_LEN {
            return Some("name is longer than 15 bytes");
        }
        if name.contains(KEY_SEPARATOR) {
            return Some("name contains '/'");
        }
        if name.chars().any(|c| c == '\0' || c.is_whitespace()) {
            return Some("name contains whitespace or NUL");
        }
        None
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for InterfaceName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for InterfaceName {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InterfaceName> for String {
    fn from(name: InterfaceName) -> Self {
        name.0
    }
}

impl AsRef<str> for InterfaceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a configured network within one interface.
///
/// Only unique per interface; pair it with an [`InterfaceName`] to address
/// a network globally.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NetworkId(u32);

impl NetworkId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NetworkId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}
