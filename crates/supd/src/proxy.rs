//! Proxy objects handed to remote callers.
//!
//! A proxy forwards each call to the daemon-internal entity it stands for
//! and returns the result unchanged. It caches nothing and never retries.
//! The only thing a proxy adds is access to the registry, for callback
//! registration and for looking up child proxies.

use std::fmt;
use std::sync::Arc;

use sup_core::{
    CoreError, DebugLevel, EntityKey, InterfaceCore, InterfaceName, NetworkCore, NetworkId, Scope,
    SupplicantCore, SupplicantState,
};
use thiserror::Error;

use crate::observer::{Observer, ObserverId};
use crate::registry::{RegistryError, RegistryHandle};

/// Errors surfaced by proxy calls.
#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    /// The daemon-internal entity refused the call.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The registry refused the call.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ============================================================================
// Root
// ============================================================================

/// Proxy for the global supplicant context.
pub struct RootProxy {
    core: Arc<dyn SupplicantCore>,
    registry: RegistryHandle,
}

impl RootProxy {
    pub(crate) fn new(core: Arc<dyn SupplicantCore>, registry: RegistryHandle) -> Self {
        Self { core, registry }
    }

    pub fn interface_names(&self) -> Vec<InterfaceName> {
        self.core.interface_names()
    }

    pub fn debug_level(&self) -> DebugLevel {
        self.core.debug_level()
    }

    pub fn set_debug_level(&self, level: DebugLevel) -> Result<(), ProxyError> {
        Ok(self.core.set_debug_level(level)?)
    }

    /// Proxy of a registered interface.
    pub async fn interface(
        &self,
        ifname: &InterfaceName,
    ) -> Result<Arc<InterfaceProxy>, ProxyError> {
        Ok(self.registry.interface_proxy(ifname).await?)
    }

    pub async fn register_callback(&self, observer: Arc<dyn Observer>) -> Result<(), ProxyError> {
        Ok(self.registry.add_callback(Scope::Global, observer).await?)
    }

    pub async fn unregister_callback(&self, observer_id: ObserverId) -> Result<bool, ProxyError> {
        Ok(self.registry.remove_callback(Scope::Global, observer_id).await?)
    }
}

impl fmt::Debug for RootProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootProxy").finish_non_exhaustive()
    }
}

// ============================================================================
// Interface
// ============================================================================

/// Proxy for one interface.
pub struct InterfaceProxy {
    core: Arc<dyn InterfaceCore>,
    registry: RegistryHandle,
}

impl InterfaceProxy {
    pub(crate) fn new(core: Arc<dyn InterfaceCore>, registry: RegistryHandle) -> Self {
        Self { core, registry }
    }

    pub fn name(&self) -> &InterfaceName {
        self.core.name()
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::interface(self.core.name())
    }

    pub fn scope(&self) -> Scope {
        Scope::interface(self.core.name().clone())
    }

    pub fn state(&self) -> SupplicantState {
        self.core.state()
    }

    pub fn add_network(&self) -> Result<NetworkId, ProxyError> {
        Ok(self.core.add_network()?)
    }

    pub fn remove_network(&self, network_id: NetworkId) -> Result<(), ProxyError> {
        Ok(self.core.remove_network(network_id)?)
    }

    pub fn list_networks(&self) -> Vec<NetworkId> {
        self.core.network_ids()
    }

    /// Proxy of a registered network of this interface.
    pub async fn network(&self, network_id: NetworkId) -> Result<Arc<NetworkProxy>, ProxyError> {
        Ok(self.registry.network_proxy(self.core.name(), network_id).await?)
    }

    pub async fn register_callback(&self, observer: Arc<dyn Observer>) -> Result<(), ProxyError> {
        Ok(self.registry.add_callback(self.scope(), observer).await?)
    }

    pub async fn unregister_callback(&self, observer_id: ObserverId) -> Result<bool, ProxyError> {
        Ok(self.registry.remove_callback(self.scope(), observer_id).await?)
    }
}

impl fmt::Debug for InterfaceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceProxy")
            .field("name", self.core.name())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Network
// ============================================================================

/// Proxy for one network of one interface.
pub struct NetworkProxy {
    core: Arc<dyn NetworkCore>,
    registry: RegistryHandle,
}

impl NetworkProxy {
    pub(crate) fn new(core: Arc<dyn NetworkCore>, registry: RegistryHandle) -> Self {
        Self { core, registry }
    }

    pub fn id(&self) -> NetworkId {
        self.core.id()
    }

    pub fn interface_name(&self) -> &InterfaceName {
        self.core.interface_name()
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::network(self.core.interface_name(), self.core.id())
    }

    pub fn scope(&self) -> Scope {
        Scope::network(self.core.interface_name().clone(), self.core.id())
    }

    pub fn ssid(&self) -> Result<Vec<u8>, ProxyError> {
        Ok(self.core.ssid()?)
    }

    pub fn set_ssid(&self, ssid: &[u8]) -> Result<(), ProxyError> {
        Ok(self.core.set_ssid(ssid)?)
    }

    pub async fn register_callback(&self, observer: Arc<dyn Observer>) -> Result<(), ProxyError> {
        Ok(self.registry.add_callback(self.scope(), observer).await?)
    }

    pub async fn unregister_callback(&self, observer_id: ObserverId) -> Result<bool, ProxyError> {
        Ok(self.registry.remove_callback(self.scope(), observer_id).await?)
    }
}

impl fmt::Debug for NetworkProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkProxy")
            .field("ifname", self.core.interface_name())
            .field("id", &self.core.id())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Entity Proxy
// ============================================================================

/// An interface or network proxy as stored in the registry.
#[derive(Debug, Clone)]
pub enum EntityProxy {
    Interface(Arc<InterfaceProxy>),
    Network(Arc<NetworkProxy>),
}

impl EntityProxy {
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Interface(proxy) => proxy.key(),
            Self::Network(proxy) => proxy.key(),
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Self::Interface(proxy) => proxy.scope(),
            Self::Network(proxy) => proxy.scope(),
        }
    }

    pub fn as_interface(&self) -> Option<&Arc<InterfaceProxy>> {
        match self {
            Self::Interface(proxy) => Some(proxy),
            Self::Network(_) => None,
        }
    }

    pub fn as_network(&self) -> Option<&Arc<NetworkProxy>> {
        match self {
            Self::Network(proxy) => Some(proxy),
            Self::Interface(_) => None,
        }
    }

    /// True if both values are the same proxy instance.
    pub fn same_instance(&self, other: &EntityProxy) -> bool {
        match (self, other) {
            (Self::Interface(a), Self::Interface(b)) => Arc::ptr_eq(a, b),
            (Self::Network(a), Self::Network(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
