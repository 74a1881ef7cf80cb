//! In-memory implementation of the daemon-internal entities.
//!
//! Used by the `supd` binary to expose a configured set of interfaces and
//! networks, and by tests. Every lifecycle change is reported through the
//! optional [`CoreNotifier`] after internal locks are released.
//!
//! Lock poisoning is recovered by taking the inner value; every mutation
//! here is a single insert/remove/assign, so a panicking writer cannot leave
//! the maps half-updated.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::{
    CoreError, CoreEvent, CoreNotifier, CoreResult, DebugLevel, InterfaceCore, InterfaceName,
    NetworkCore, NetworkId, NetworkRequestKind, SupplicantCore, SupplicantState,
};

/// Maximum SSID length in octets.
pub const MAX_SSID_LEN: usize = 32;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Default)]
struct Notify(Option<Arc<dyn CoreNotifier>>);

impl Notify {
    fn send(&self, event: CoreEvent) {
        if let Some(notifier) = &self.0 {
            notifier.notify(event);
        }
    }
}

// ============================================================================
// Supplicant
// ============================================================================

/// Global supplicant context holding a set of in-memory interfaces.
#[derive(Default)]
pub struct InMemorySupplicant {
    interfaces: RwLock<BTreeMap<InterfaceName, Arc<InMemoryInterface>>>,
    debug_level: RwLock<DebugLevel>,
    notify: Notify,
}

impl InMemorySupplicant {
    /// Creates a supplicant that reports nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a supplicant reporting lifecycle changes to `notifier`.
    pub fn with_notifier(notifier: Arc<dyn CoreNotifier>) -> Self {
        Self {
            notify: Notify(Some(notifier)),
            ..Self::default()
        }
    }

    /// Brings up a new interface.
    ///
    /// # Errors
    /// - `CoreError::InterfaceExists` if an interface with this name exists
    pub fn add_interface(&self, ifname: InterfaceName) -> CoreResult<Arc<InMemoryInterface>> {
        let iface = {
            let mut interfaces = write(&self.interfaces);
            if interfaces.contains_key(&ifname) {
                return Err(CoreError::InterfaceExists(ifname));
            }
            let iface = Arc::new(InMemoryInterface::new(ifname.clone(), self.notify.clone()));
            interfaces.insert(ifname.clone(), Arc::clone(&iface));
            iface
        };

        debug!(ifname = %ifname, "Interface added");
        self.notify
            .send(CoreEvent::InterfaceAdded(Arc::clone(&iface) as Arc<dyn InterfaceCore>));
        Ok(iface)
    }

    /// Tears down an interface, reporting each of its networks removed first.
    ///
    /// # Errors
    /// - `CoreError::UnknownInterface` if no such interface exists
    pub fn remove_interface(&self, ifname: &InterfaceName) -> CoreResult<()> {
        let iface = write(&self.interfaces)
            .remove(ifname)
            .ok_or_else(|| CoreError::UnknownInterface(ifname.clone()))?;

        let network_ids: Vec<NetworkId> = std::mem::take(&mut *write(&iface.networks))
            .into_keys()
            .collect();
        for network_id in network_ids {
            self.notify.send(CoreEvent::NetworkRemoved {
                ifname: ifname.clone(),
                network_id,
            });
        }

        debug!(ifname = %ifname, "Interface removed");
        self.notify.send(CoreEvent::InterfaceRemoved(ifname.clone()));
        Ok(())
    }

    pub fn interface(&self, ifname: &InterfaceName) -> Option<Arc<InMemoryInterface>> {
        read(&self.interfaces).get(ifname).cloned()
    }
}

impl SupplicantCore for InMemorySupplicant {
    fn interface_names(&self) -> Vec<InterfaceName> {
        read(&self.interfaces).keys().cloned().collect()
    }

    fn debug_level(&self) -> DebugLevel {
        *read(&self.debug_level)
    }

    fn set_debug_level(&self, level: DebugLevel) -> CoreResult<()> {
        *write(&self.debug_level) = level;
        debug!(level = ?level, "Debug level changed");
        Ok(())
    }
}

// ============================================================================
// Interface
// ============================================================================

/// An interface with its configured networks.
pub struct InMemoryInterface {
    name: InterfaceName,
    state: RwLock<SupplicantState>,
    networks: RwLock<BTreeMap<NetworkId, Arc<InMemoryNetwork>>>,
    next_network_id: AtomicU32,
    notify: Notify,
}

impl InMemoryInterface {
    fn new(name: InterfaceName, notify: Notify) -> Self {
        Self {
            name,
            state: RwLock::new(SupplicantState::default()),
            networks: RwLock::new(BTreeMap::new()),
            next_network_id: AtomicU32::new(0),
            notify,
        }
    }

    pub fn network(&self, network_id: NetworkId) -> Option<Arc<InMemoryNetwork>> {
        read(&self.networks).get(&network_id).cloned()
    }

    /// Moves the interface to `state` and reports the change.
    pub fn set_state(
        &self,
        state: SupplicantState,
        bssid: Option<[u8; 6]>,
        network_id: Option<NetworkId>,
    ) {
        *write(&self.state) = state;

        let ssid = network_id
            .and_then(|id| self.network(id))
            .map(|network| read(&network.ssid).clone());

        self.notify.send(CoreEvent::StateChanged {
            ifname: self.name.clone(),
            state,
            bssid,
            network_id,
            ssid,
        });
    }

    /// Asks the observers of a network for credentials.
    ///
    /// # Errors
    /// - `CoreError::UnknownNetwork` if the network does not exist
    pub fn request_credentials(
        &self,
        network_id: NetworkId,
        request: NetworkRequestKind,
    ) -> CoreResult<()> {
        if self.network(network_id).is_none() {
            return Err(self.unknown_network(network_id));
        }
        self.notify.send(CoreEvent::NetworkRequest {
            ifname: self.name.clone(),
            network_id,
            request,
        });
        Ok(())
    }

    fn unknown_network(&self, network_id: NetworkId) -> CoreError {
        CoreError::UnknownNetwork {
            ifname: self.name.clone(),
            network_id,
        }
    }
}

impl InterfaceCore for InMemoryInterface {
    fn name(&self) -> &InterfaceName {
        &self.name
    }

    fn state(&self) -> SupplicantState {
        *read(&self.state)
    }

    fn add_network(&self) -> CoreResult<NetworkId> {
        let raw = self
            .next_network_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| id.checked_add(1))
            .map_err(|_| CoreError::NetworkIdsExhausted(self.name.clone()))?;
        let network_id = NetworkId::new(raw);
        let network = Arc::new(InMemoryNetwork::new(network_id, self.name.clone()));
        write(&self.networks).insert(network_id, Arc::clone(&network));

        debug!(ifname = %self.name, network_id = %network_id, "Network added");
        self.notify
            .send(CoreEvent::NetworkAdded(network as Arc<dyn NetworkCore>));
        Ok(network_id)
    }

    fn remove_network(&self, network_id: NetworkId) -> CoreResult<()> {
        write(&self.networks)
            .remove(&network_id)
            .ok_or_else(|| self.unknown_network(network_id))?;

        debug!(ifname = %self.name, network_id = %network_id, "Network removed");
        self.notify.send(CoreEvent::NetworkRemoved {
            ifname: self.name.clone(),
            network_id,
        });
        Ok(())
    }

    fn network_ids(&self) -> Vec<NetworkId> {
        read(&self.networks).keys().copied().collect()
    }
}

// ============================================================================
// Network
// ============================================================================

/// A network configuration.
pub struct InMemoryNetwork {
    id: NetworkId,
    ifname: InterfaceName,
    ssid: RwLock<Vec<u8>>,
}

impl InMemoryNetwork {
    fn new(id: NetworkId, ifname: InterfaceName) -> Self {
        Self {
            id,
            ifname,
            ssid: RwLock::new(Vec::new()),
        }
    }
}

impl NetworkCore for InMemoryNetwork {
    fn id(&self) -> NetworkId {
        self.id
    }

    fn interface_name(&self) -> &InterfaceName {
        &self.ifname
    }

    fn ssid(&self) -> CoreResult<Vec<u8>> {
        Ok(read(&self.ssid).clone())
    }

    fn set_ssid(&self, ssid: &[u8]) -> CoreResult<()> {
        if ssid.len() > MAX_SSID_LEN {
            return Err(CoreError::InvalidSsid(ssid.len()));
        }
        *write(&self.ssid) = ssid.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl CoreNotifier for Recorder {
        fn notify(&self, event: CoreEvent) {
            let line = match event {
                CoreEvent::InterfaceAdded(iface) => format!("iface+ {}", iface.name()),
                CoreEvent::InterfaceRemoved(ifname) => format!("iface- {ifname}"),
                CoreEvent::NetworkAdded(net) => {
                    format!("net+ {}/{}", net.interface_name(), net.id())
                }
                CoreEvent::NetworkRemoved { ifname, network_id } => {
                    format!("net- {ifname}/{network_id}")
                }
                CoreEvent::StateChanged { ifname, state, .. } => {
                    format!("state {ifname} {state:?}")
                }
                CoreEvent::NetworkRequest {
                    ifname, network_id, ..
                } => format!("request {ifname}/{network_id}"),
            };
            self.0.lock().unwrap().push(line);
        }
    }

    fn wlan0() -> InterfaceName {
        InterfaceName::new("wlan0").unwrap()
    }

    #[test]
    fn test_interface_lifecycle_notifications() {
        let recorder = Arc::new(Recorder::default());
        let supplicant = InMemorySupplicant::with_notifier(recorder.clone());

        let iface = supplicant.add_interface(wlan0()).unwrap();
        let first = iface.add_network().unwrap();
        let second = iface.add_network().unwrap();
        assert_eq!(first, NetworkId::new(0));
        assert_eq!(second, NetworkId::new(1));

        supplicant.remove_interface(&wlan0()).unwrap();

        let lines = recorder.0.lock().unwrap().clone();
        assert_eq!(
            lines,
            vec![
                "iface+ wlan0",
                "net+ wlan0/0",
                "net+ wlan0/1",
                "net- wlan0/0",
                "net- wlan0/1",
                "iface- wlan0",
            ]
        );
    }

    #[test]
    fn test_duplicate_interface_rejected() {
        let supplicant = InMemorySupplicant::new();
        supplicant.add_interface(wlan0()).unwrap();

        let result = supplicant.add_interface(wlan0());
        assert!(matches!(result, Err(CoreError::InterfaceExists(_))));
        assert_eq!(supplicant.interface_names(), vec![wlan0()]);
    }

    #[test]
    fn test_remove_unknown() {
        let supplicant = InMemorySupplicant::new();
        assert!(matches!(
            supplicant.remove_interface(&wlan0()),
            Err(CoreError::UnknownInterface(_))
        ));

        let iface = supplicant.add_interface(wlan0()).unwrap();
        assert!(matches!(
            iface.remove_network(NetworkId::new(9)),
            Err(CoreError::UnknownNetwork { .. })
        ));
    }

    #[test]
    fn test_network_ids_never_wrap() {
        let recorder = Arc::new(Recorder::default());
        let supplicant = InMemorySupplicant::with_notifier(recorder.clone());
        let iface = supplicant.add_interface(wlan0()).unwrap();
        iface.next_network_id.store(u32::MAX - 1, Ordering::Relaxed);

        let last = iface.add_network().unwrap();
        assert_eq!(last, NetworkId::new(u32::MAX - 1));

        assert_eq!(
            iface.add_network(),
            Err(CoreError::NetworkIdsExhausted(wlan0()))
        );
        assert_eq!(iface.network_ids(), vec![last]);
        assert_eq!(recorder.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_network_ssid() {
        let supplicant = InMemorySupplicant::new();
        let iface = supplicant.add_interface(wlan0()).unwrap();
        let id = iface.add_network().unwrap();
        let network = iface.network(id).unwrap();

        network.set_ssid(b"home").unwrap();
        assert_eq!(network.ssid().unwrap(), b"home".to_vec());
        assert_eq!(
            network.set_ssid(&[0u8; 33]),
            Err(CoreError::InvalidSsid(33))
        );
    }

    #[test]
    fn test_state_change_carries_ssid() {
        let recorder = Arc::new(Recorder::default());
        let supplicant = InMemorySupplicant::with_notifier(recorder.clone());
        let iface = supplicant.add_interface(wlan0()).unwrap();
        let id = iface.add_network().unwrap();

        iface.set_state(SupplicantState::Completed, Some([0, 1, 2, 3, 4, 5]), Some(id));
        assert_eq!(iface.state(), SupplicantState::Completed);
        assert_eq!(
            recorder.0.lock().unwrap().last().cloned(),
            Some("state wlan0 Completed".to_string())
        );
    }

    #[test]
    fn test_debug_level() {
        let supplicant = InMemorySupplicant::new();
        assert_eq!(supplicant.debug_level(), DebugLevel::Info);
        supplicant.set_debug_level(DebugLevel::Debug).unwrap();
        assert_eq!(supplicant.debug_level(), DebugLevel::Debug);
    }
}
