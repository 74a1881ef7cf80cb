//! Registry actor commands, errors, and reports.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `RemovalReason`: Why a callback registration went away
//! - `RegistrySnapshot` / `BroadcastOutcome`: reports handed back to callers
//!
//! All types are designed for async message passing and follow the panic-free policy.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use sup_core::{EntityKey, Scope};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::observer::{Observer, ObserverId};
use crate::proxy::{EntityProxy, RootProxy};

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, except the
/// fire-and-forget `ObserverDied` sent by liveness monitors.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Install the root proxy and start accepting entity registrations.
    ///
    /// # Errors
    /// - `RegistryError::AlreadyInitialized` on a second call
    /// - `RegistryError::TornDown` after teardown
    Initialize {
        root: Arc<RootProxy>,
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Fetch the root proxy.
    Root {
        respond_to: oneshot::Sender<Result<Arc<RootProxy>, RegistryError>>,
    },

    /// Insert an interface or network proxy under its key.
    ///
    /// # Errors
    /// - `RegistryError::EntityAlreadyExists` if the key is taken
    /// - `RegistryError::EntityNotFound` for a network whose interface is unknown
    RegisterEntity {
        proxy: EntityProxy,
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Remove a proxy. Removing an interface also removes its networks;
    /// the response lists every removed proxy, the requested one first.
    ///
    /// # Errors
    /// - `RegistryError::EntityNotFound` if the key is absent
    UnregisterEntity {
        key: EntityKey,
        respond_to: oneshot::Sender<Result<Vec<EntityProxy>, RegistryError>>,
    },

    /// Look up a proxy by key.
    LookupEntity {
        key: EntityKey,
        respond_to: oneshot::Sender<Result<EntityProxy, RegistryError>>,
    },

    /// Register an observer for a scope and arm its liveness monitor.
    ///
    /// # Errors
    /// - `RegistryError::CallbackAlreadyRegistered` for a duplicate pair
    /// - `RegistryError::EntityNotFound` if the scope's entity is not registered
    AddCallback {
        scope: Scope,
        observer: Arc<dyn Observer>,
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Remove one registration. Responds `false` if it was not present.
    RemoveCallback {
        scope: Scope,
        observer_id: ObserverId,
        reason: RemovalReason,
        respond_to: oneshot::Sender<bool>,
    },

    /// Sent by a liveness monitor when its observer's connection died.
    ObserverDied {
        scope: Scope,
        observer_id: ObserverId,
    },

    /// Remove every registration under a scope; responds with the count.
    ClearCallbacks {
        scope: Scope,
        respond_to: oneshot::Sender<usize>,
    },

    /// Snapshot the observers registered under a scope, for delivery
    /// outside the actor.
    Observers {
        scope: Scope,
        respond_to: oneshot::Sender<Result<Vec<Arc<dyn Observer>>, RegistryError>>,
    },

    /// Describe the registry's current contents.
    Snapshot {
        respond_to: oneshot::Sender<RegistrySnapshot>,
    },

    /// Drop every proxy and registration and refuse further work.
    Teardown {
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// The three error classes callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Duplicate key or registration. Recoverable.
    AlreadyExists,
    /// Unknown key or scope. Usually a stale reference.
    NotFound,
    /// Called before `initialize` or after `teardown`. A sequencing bug.
    InvalidState,
}

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("entity already registered: {0}")]
    EntityAlreadyExists(EntityKey),

    #[error("entity not found: {0}")]
    EntityNotFound(EntityKey),

    #[error("{observer} already registered for {scope}")]
    CallbackAlreadyRegistered { scope: Scope, observer: ObserverId },

    #[error("registry is not initialized")]
    NotInitialized,

    #[error("registry is already initialized")]
    AlreadyInitialized,

    #[error("registry has been torn down")]
    TornDown,

    /// The actor is gone (all of its state with it).
    #[error("response channel closed")]
    ChannelClosed,
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EntityAlreadyExists(_) | Self::CallbackAlreadyRegistered { .. } => {
                ErrorKind::AlreadyExists
            }
            Self::EntityNotFound(_) => ErrorKind::NotFound,
            Self::NotInitialized
            | Self::AlreadyInitialized
            | Self::TornDown
            | Self::ChannelClosed => ErrorKind::InvalidState,
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Reason a callback registration was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// The observer (or the daemon on its behalf) asked for removal.
    Explicit,

    /// The transport reported the observer's connection dead.
    ObserverDied,

    /// An event could not be delivered to the observer.
    DeliveryFailed,

    /// The scope's callbacks were cleared after its entity went away.
    Cleared,

    /// The registry was torn down.
    Teardown,
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicitly removed"),
            Self::ObserverDied => write!(f, "observer connection died"),
            Self::DeliveryFailed => write!(f, "event delivery failed"),
            Self::Cleared => write!(f, "scope cleared"),
            Self::Teardown => write!(f, "registry torn down"),
        }
    }
}

/// Result of one broadcast. Failures are not errors; they are counted and
/// the failing registrations removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    pub dropped: usize,
}

/// Point-in-time view of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub initialized: bool,
    pub torn_down: bool,
    pub entities: Vec<EntityKey>,
    pub callbacks: BTreeMap<Scope, usize>,
}

impl RegistrySnapshot {
    pub fn callback_count(&self, scope: &Scope) -> usize {
        self.callbacks.get(scope).copied().unwrap_or(0)
    }

    pub fn total_callbacks(&self) -> usize {
        self.callbacks.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sup_core::{InterfaceName, NetworkId};

    fn wlan0() -> InterfaceName {
        InterfaceName::new("wlan0").unwrap()
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::EntityAlreadyExists(EntityKey::interface(&wlan0()));
        assert_eq!(err.to_string(), "entity already registered: wlan0");

        let err = RegistryError::EntityNotFound(EntityKey::network(&wlan0(), NetworkId::new(1)));
        assert_eq!(err.to_string(), "entity not found: wlan0/1");

        let err = RegistryError::CallbackAlreadyRegistered {
            scope: Scope::Global,
            observer: ObserverId::new(7),
        };
        assert_eq!(err.to_string(), "obs-7 already registered for global");

        assert_eq!(RegistryError::NotInitialized.to_string(), "registry is not initialized");
        assert_eq!(RegistryError::ChannelClosed.to_string(), "response channel closed");
    }

    #[test]
    fn test_error_kinds() {
        let key = EntityKey::interface(&wlan0());
        assert_eq!(
            RegistryError::EntityAlreadyExists(key.clone()).kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(RegistryError::EntityNotFound(key).kind(), ErrorKind::NotFound);
        assert_eq!(
            RegistryError::CallbackAlreadyRegistered {
                scope: Scope::Global,
                observer: ObserverId::new(1),
            }
            .kind(),
            ErrorKind::AlreadyExists
        );
        for err in [
            RegistryError::NotInitialized,
            RegistryError::AlreadyInitialized,
            RegistryError::TornDown,
            RegistryError::ChannelClosed,
        ] {
            assert_eq!(err.kind(), ErrorKind::InvalidState);
        }
    }

    #[test]
    fn test_removal_reason_display() {
        assert_eq!(RemovalReason::Explicit.to_string(), "explicitly removed");
        assert_eq!(RemovalReason::ObserverDied.to_string(), "observer connection died");
        assert_eq!(RemovalReason::DeliveryFailed.to_string(), "event delivery failed");
        assert_eq!(RemovalReason::Cleared.to_string(), "scope cleared");
        assert_eq!(RemovalReason::Teardown.to_string(), "registry torn down");
    }

    #[test]
    fn test_snapshot_counts() {
        let mut snapshot = RegistrySnapshot::default();
        snapshot.callbacks.insert(Scope::Global, 2);
        snapshot.callbacks.insert(Scope::interface(wlan0()), 3);

        assert_eq!(snapshot.callback_count(&Scope::Global), 2);
        assert_eq!(
            snapshot.callback_count(&Scope::network(wlan0(), NetworkId::new(0))),
            0
        );
        assert_eq!(snapshot.total_callbacks(), 5);
    }
}
