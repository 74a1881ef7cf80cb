//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` is a cheap-to-clone interface for sending commands
//! to the registry actor. The daemon core uses it to register entities and
//! publish events; proxies use it to register callbacks.
//!
//! # Broadcast
//!
//! `broadcast` asks the actor for a snapshot of the scope's observers and
//! delivers outside the actor, one observer at a time. A slow observer
//! delays only the broadcast that targets it; registrations keep flowing.
//! Observers whose delivery fails are removed through the same command the
//! liveness monitors use, queued behind the snapshot.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use std::sync::Arc;

use sup_core::{
    EntityKey, EventEnvelope, InterfaceCore, InterfaceName, NetworkCore, NetworkId, Scope,
    SupplicantCore, SupplicantEvent,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::commands::{
    BroadcastOutcome, RegistryCommand, RegistryError, RegistrySnapshot, RemovalReason,
};
use crate::observer::{Observer, ObserverId};
use crate::proxy::{EntityProxy, InterfaceProxy, NetworkProxy, RootProxy};

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// # Usage
///
/// ```ignore
/// let registry = spawn_registry();
/// let root = registry.initialize(supplicant).await?;
///
/// let iface = registry.register_interface(wlan0).await?;
/// iface.register_callback(observer).await?;
///
/// registry.broadcast(iface.scope(), event).await?;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Sends a command built around a fresh oneshot and waits for the reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(build(tx))
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Creates the root proxy and starts accepting registrations.
    ///
    /// # Errors
    ///
    /// - `RegistryError::AlreadyInitialized` on a second call
    /// - `RegistryError::TornDown` after `teardown`
    pub async fn initialize(
        &self,
        core: Arc<dyn SupplicantCore>,
    ) -> Result<Arc<RootProxy>, RegistryError> {
        let root = Arc::new(RootProxy::new(core, self.clone()));
        let installed = Arc::clone(&root);

        self.request(|respond_to| RegistryCommand::Initialize {
            root: installed,
            respond_to,
        })
        .await??;

        Ok(root)
    }

    /// The root proxy created by `initialize`.
    pub async fn root(&self) -> Result<Arc<RootProxy>, RegistryError> {
        self.request(|respond_to| RegistryCommand::Root { respond_to })
            .await?
    }

    /// Drops every proxy and callback registration. Later calls fail with
    /// `RegistryError::TornDown`.
    pub async fn teardown(&self) -> Result<(), RegistryError> {
        self.request(|respond_to| RegistryCommand::Teardown { respond_to })
            .await?
    }

    // ========================================================================
    // Entities
    // ========================================================================

    /// Registers a proxy under its key.
    ///
    /// # Errors
    ///
    /// - `RegistryError::EntityAlreadyExists` if the key is taken
    /// - `RegistryError::EntityNotFound` for a network whose interface is unknown
    /// - `RegistryError::NotInitialized` / `TornDown`
    pub async fn register_entity(&self, proxy: EntityProxy) -> Result<(), RegistryError> {
        self.request(|respond_to| RegistryCommand::RegisterEntity { proxy, respond_to })
            .await?
    }

    /// Removes the proxy under `key`, plus any networks of an interface.
    ///
    /// Returns the removed proxies, the requested one first. Callback
    /// registrations are not touched.
    pub async fn unregister_entity(
        &self,
        key: EntityKey,
    ) -> Result<Vec<EntityProxy>, RegistryError> {
        self.request(|respond_to| RegistryCommand::UnregisterEntity { key, respond_to })
            .await?
    }

    pub async fn lookup_entity(&self, key: EntityKey) -> Result<EntityProxy, RegistryError> {
        self.request(|respond_to| RegistryCommand::LookupEntity { key, respond_to })
            .await?
    }

    /// Exposes an interface and tells global observers about it.
    pub async fn register_interface(
        &self,
        core: Arc<dyn InterfaceCore>,
    ) -> Result<Arc<InterfaceProxy>, RegistryError> {
        let proxy = Arc::new(InterfaceProxy::new(core, self.clone()));
        self.register_entity(EntityProxy::Interface(Arc::clone(&proxy)))
            .await?;

        self.announce(
            Scope::Global,
            SupplicantEvent::InterfaceCreated {
                ifname: proxy.name().clone(),
            },
        )
        .await;
        Ok(proxy)
    }

    /// Withdraws an interface and its networks.
    ///
    /// Each cascaded network's own observers, then the interface's
    /// observers, hear `NetworkRemoved`; global observers then hear
    /// `InterfaceRemoved`. Returns the ids of the cascaded networks so the
    /// caller can clear their scopes.
    pub async fn unregister_interface(
        &self,
        ifname: &InterfaceName,
    ) -> Result<Vec<NetworkId>, RegistryError> {
        let removed = self.unregister_entity(EntityKey::interface(ifname)).await?;
        let network_ids: Vec<NetworkId> = removed
            .iter()
            .filter_map(EntityProxy::as_network)
            .map(|proxy| proxy.id())
            .collect();

        for &network_id in &network_ids {
            self.announce_network_removed(ifname, network_id).await;
        }

        self.announce(
            Scope::Global,
            SupplicantEvent::InterfaceRemoved {
                ifname: ifname.clone(),
            },
        )
        .await;
        Ok(network_ids)
    }

    /// Exposes a network and tells its interface's observers about it.
    pub async fn register_network(
        &self,
        core: Arc<dyn NetworkCore>,
    ) -> Result<Arc<NetworkProxy>, RegistryError> {
        let proxy = Arc::new(NetworkProxy::new(core, self.clone()));
        self.register_entity(EntityProxy::Network(Arc::clone(&proxy)))
            .await?;

        self.announce(
            Scope::interface(proxy.interface_name().clone()),
            SupplicantEvent::NetworkAdded {
                ifname: proxy.interface_name().clone(),
                network_id: proxy.id(),
            },
        )
        .await;
        Ok(proxy)
    }

    /// Withdraws a network and tells its own observers, then its
    /// interface's observers.
    pub async fn unregister_network(
        &self,
        ifname: &InterfaceName,
        network_id: NetworkId,
    ) -> Result<(), RegistryError> {
        self.unregister_entity(EntityKey::network(ifname, network_id))
            .await?;
        self.announce_network_removed(ifname, network_id).await;
        Ok(())
    }

    /// The registered proxy for `ifname`.
    pub async fn interface_proxy(
        &self,
        ifname: &InterfaceName,
    ) -> Result<Arc<InterfaceProxy>, RegistryError> {
        let key = EntityKey::interface(ifname);
        match self.lookup_entity(key.clone()).await? {
            EntityProxy::Interface(proxy) => Ok(proxy),
            EntityProxy::Network(_) => Err(RegistryError::EntityNotFound(key)),
        }
    }

    /// The registered proxy for network `network_id` of `ifname`.
    pub async fn network_proxy(
        &self,
        ifname: &InterfaceName,
        network_id: NetworkId,
    ) -> Result<Arc<NetworkProxy>, RegistryError> {
        let key = EntityKey::network(ifname, network_id);
        match self.lookup_entity(key.clone()).await? {
            EntityProxy::Network(proxy) => Ok(proxy),
            EntityProxy::Interface(_) => Err(RegistryError::EntityNotFound(key)),
        }
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    /// Registers `observer` for events under `scope`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::CallbackAlreadyRegistered` if this observer is
    ///   already registered for `scope` (the registration is unchanged)
    /// - `RegistryError::EntityNotFound` if the scope's entity is not registered
    /// - `RegistryError::NotInitialized` / `TornDown`
    pub async fn add_callback(
        &self,
        scope: Scope,
        observer: Arc<dyn Observer>,
    ) -> Result<(), RegistryError> {
        self.request(|respond_to| RegistryCommand::AddCallback {
            scope,
            observer,
            respond_to,
        })
        .await?
    }

    /// Removes one registration. Returns `false` if it was not there; that
    /// is not an error.
    pub async fn remove_callback(
        &self,
        scope: Scope,
        observer_id: ObserverId,
    ) -> Result<bool, RegistryError> {
        self.remove_callback_for(scope, observer_id, RemovalReason::Explicit)
            .await
    }

    async fn remove_callback_for(
        &self,
        scope: Scope,
        observer_id: ObserverId,
        reason: RemovalReason,
    ) -> Result<bool, RegistryError> {
        self.request(|respond_to| RegistryCommand::RemoveCallback {
            scope,
            observer_id,
            reason,
            respond_to,
        })
        .await
    }

    /// Removes every registration under `scope`, returning how many went.
    ///
    /// The daemon calls this after an entity is gone and its final events
    /// have been delivered.
    pub async fn clear_callbacks(&self, scope: Scope) -> Result<usize, RegistryError> {
        self.request(|respond_to| RegistryCommand::ClearCallbacks { scope, respond_to })
            .await
    }

    /// Delivers `event` to every observer registered under `scope`.
    ///
    /// Delivery failures are not errors: the failing observer is treated as
    /// dead and loses its registrations in every scope, and the remaining
    /// observers still get the event.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NotInitialized` / `TornDown`
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn broadcast(
        &self,
        scope: Scope,
        event: SupplicantEvent,
    ) -> Result<BroadcastOutcome, RegistryError> {
        let observers = self
            .request(|respond_to| RegistryCommand::Observers {
                scope: scope.clone(),
                respond_to,
            })
            .await??;

        let envelope = EventEnvelope::new(scope.clone(), event);
        let mut outcome = BroadcastOutcome::default();

        for observer in observers {
            match observer.deliver(&envelope).await {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    warn!(
                        scope = %scope,
                        observer = %observer.id(),
                        error = %e,
                        "Delivery failed, dropping observer"
                    );
                    outcome.dropped += 1;
                    self.remove_callback_for(
                        scope.clone(),
                        observer.id(),
                        RemovalReason::DeliveryFailed,
                    )
                    .await?;
                    // A failed delivery counts as death: the monitors of the
                    // observer's other scopes reap those registrations.
                    observer.death_signal().notify_dead();
                }
            }
        }

        debug!(
            scope = %scope,
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            "Broadcast complete"
        );
        Ok(outcome)
    }

    async fn announce_network_removed(&self, ifname: &InterfaceName, network_id: NetworkId) {
        let event = SupplicantEvent::NetworkRemoved {
            ifname: ifname.clone(),
            network_id,
        };
        self.announce(Scope::network(ifname.clone(), network_id), event.clone())
            .await;
        self.announce(Scope::interface(ifname.clone()), event).await;
    }

    /// Broadcast for lifecycle notifications; failures are only logged.
    async fn announce(&self, scope: Scope, event: SupplicantEvent) {
        if let Err(e) = self.broadcast(scope.clone(), event).await {
            debug!(scope = %scope, error = %e, "Lifecycle event not delivered");
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Describes what the registry currently holds.
    pub async fn snapshot(&self) -> Result<RegistrySnapshot, RegistryError> {
        self.request(|respond_to| RegistryCommand::Snapshot { respond_to })
            .await
    }

    /// Check if the actor is still running.
    ///
    /// Returns `true` if the command channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

impl std::fmt::Debug for RegistryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryHandle")
            .field("connected", &self.is_connected())
            .finish()
    }
}
