//! Daemon-internal entity handlers.
//!
//! These traits are the seam between the registry's proxy objects and the
//! supplicant's own state. A proxy holds an `Arc<dyn ...Core>` and forwards
//! every call to it unchanged.
//!
//! The daemon reports its own lifecycle changes through [`CoreNotifier`],
//! which the registry side turns into proxy registration and observer
//! broadcasts.

use std::fmt;
use std::sync::Arc;

use crate::{
    CoreResult, DebugLevel, InterfaceName, NetworkId, NetworkRequestKind, SupplicantState,
};

/// The global supplicant context.
pub trait SupplicantCore: Send + Sync {
    fn interface_names(&self) -> Vec<InterfaceName>;

    fn debug_level(&self) -> DebugLevel;

    fn set_debug_level(&self, level: DebugLevel) -> CoreResult<()>;
}

/// One interface controlled by the supplicant.
pub trait InterfaceCore: Send + Sync {
    fn name(&self) -> &InterfaceName;

    fn state(&self) -> SupplicantState;

    /// Adds an empty network configuration and returns its id.
    fn add_network(&self) -> CoreResult<NetworkId>;

    fn remove_network(&self, network_id: NetworkId) -> CoreResult<()>;

    fn network_ids(&self) -> Vec<NetworkId>;
}

/// One configured network of an interface.
pub trait NetworkCore: Send + Sync {
    fn id(&self) -> NetworkId;

    fn interface_name(&self) -> &InterfaceName;

    fn ssid(&self) -> CoreResult<Vec<u8>>;

    fn set_ssid(&self, ssid: &[u8]) -> CoreResult<()>;
}

/// Lifecycle and state notifications emitted by the daemon core.
///
/// Children are always reported removed before their parent.
#[derive(Clone)]
pub enum CoreEvent {
    InterfaceAdded(Arc<dyn InterfaceCore>),
    InterfaceRemoved(InterfaceName),
    NetworkAdded(Arc<dyn NetworkCore>),
    NetworkRemoved {
        ifname: InterfaceName,
        network_id: NetworkId,
    },
    StateChanged {
        ifname: InterfaceName,
        state: SupplicantState,
        bssid: Option<[u8; 6]>,
        network_id: Option<NetworkId>,
        ssid: Option<Vec<u8>>,
    },
    NetworkRequest {
        ifname: InterfaceName,
        network_id: NetworkId,
        request: NetworkRequestKind,
    },
}

impl CoreEvent {
    /// Variant name, for logging without formatting the payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InterfaceAdded(_) => "InterfaceAdded",
            Self::InterfaceRemoved(_) => "InterfaceRemoved",
            Self::NetworkAdded(_) => "NetworkAdded",
            Self::NetworkRemoved { .. } => "NetworkRemoved",
            Self::StateChanged { .. } => "StateChanged",
            Self::NetworkRequest { .. } => "NetworkRequest",
        }
    }
}

impl fmt::Debug for CoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InterfaceAdded(iface) => f
                .debug_tuple("InterfaceAdded")
                .field(iface.name())
                .finish(),
            Self::InterfaceRemoved(ifname) => {
                f.debug_tuple("InterfaceRemoved").field(ifname).finish()
            }
            Self::NetworkAdded(network) => f
                .debug_struct("NetworkAdded")
                .field("ifname", network.interface_name())
                .field("network_id", &network.id())
                .finish(),
            Self::NetworkRemoved { ifname, network_id } => f
                .debug_struct("NetworkRemoved")
                .field("ifname", ifname)
                .field("network_id", network_id)
                .finish(),
            Self::StateChanged { ifname, state, .. } => f
                .debug_struct("StateChanged")
                .field("ifname", ifname)
                .field("state", state)
                .finish_non_exhaustive(),
            Self::NetworkRequest {
                ifname,
                network_id,
                request,
            } => f
                .debug_struct("NetworkRequest")
                .field("ifname", ifname)
                .field("network_id", network_id)
                .field("request", request)
                .finish(),
        }
    }
}

/// Sink for [`CoreEvent`]s. Must not block the caller.
pub trait CoreNotifier: Send + Sync {
    fn notify(&self, event: CoreEvent);
}
