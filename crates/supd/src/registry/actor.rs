//! Registry actor - owns all proxies and callback registrations.
//!
//! The RegistryActor is the single owner of registry state. It receives
//! commands via an mpsc channel and processes them one at a time, which
//! makes the command loop the registry's only mutual-exclusion domain.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Response send failures are ignored (the caller went away)

use std::collections::HashMap;
use std::sync::Arc;

use sup_core::{EntityKey, EntityKind, Scope};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::callbacks::{CallbackRegistration, CallbackTable};
use super::commands::{RegistryCommand, RegistryError, RegistrySnapshot, RemovalReason};
use crate::liveness::LivenessMonitor;
use crate::observer::{Observer, ObserverId};
use crate::proxy::{EntityProxy, RootProxy};

/// Lifecycle of the registry.
#[derive(Debug)]
enum Lifecycle {
    Uninitialized,
    Running(Arc<RootProxy>),
    TornDown,
}

/// The registry actor - owns all proxy and callback state.
///
/// # Ownership
///
/// The actor owns:
/// - `entities`: interface and network proxies keyed by [`EntityKey`]
/// - `callbacks`: observer registrations keyed by [`Scope`]
/// - the root proxy, once initialized
///
/// Proxies hold a `RegistryHandle`, so while any proxy is registered the
/// command channel stays open. `Teardown` drops them all.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Weak sender for liveness monitors to report deaths back to us
    weak_sender: mpsc::WeakSender<RegistryCommand>,

    lifecycle: Lifecycle,

    entities: HashMap<EntityKey, EntityProxy>,

    callbacks: CallbackTable,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `weak_sender` - Weak handle to the same channel, used by liveness monitors
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        weak_sender: mpsc::WeakSender<RegistryCommand>,
    ) -> Self {
        Self {
            receiver,
            weak_sender,
            lifecycle: Lifecycle::Uninitialized,
            entities: HashMap::new(),
            callbacks: CallbackTable::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            entities = self.entities.len(),
            callbacks = self.callbacks.len(),
            "Registry actor stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Initialize { root, respond_to } => {
                let _ = respond_to.send(self.handle_initialize(root));
            }
            RegistryCommand::Root { respond_to } => {
                let _ = respond_to.send(self.running().map(Arc::clone));
            }
            RegistryCommand::RegisterEntity { proxy, respond_to } => {
                let _ = respond_to.send(self.handle_register_entity(proxy));
            }
            RegistryCommand::UnregisterEntity { key, respond_to } => {
                let _ = respond_to.send(self.handle_unregister_entity(&key));
            }
            RegistryCommand::LookupEntity { key, respond_to } => {
                let _ = respond_to.send(self.handle_lookup_entity(&key));
            }
            RegistryCommand::AddCallback {
                scope,
                observer,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_add_callback(scope, observer));
            }
            RegistryCommand::RemoveCallback {
                scope,
                observer_id,
                reason,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_remove_callback(&scope, observer_id, reason));
            }
            RegistryCommand::ObserverDied { scope, observer_id } => {
                self.handle_remove_callback(&scope, observer_id, RemovalReason::ObserverDied);
            }
            RegistryCommand::ClearCallbacks { scope, respond_to } => {
                let _ = respond_to.send(self.handle_clear_callbacks(&scope));
            }
            RegistryCommand::Observers { scope, respond_to } => {
                let result = self
                    .running()
                    .map(|_| self.callbacks.observers(&scope));
                let _ = respond_to.send(result);
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.handle_snapshot());
            }
            RegistryCommand::Teardown { respond_to } => {
                let _ = respond_to.send(self.handle_teardown());
            }
        }
    }

    /// Returns the root proxy, or the lifecycle error for this state.
    fn running(&self) -> Result<&Arc<RootProxy>, RegistryError> {
        match &self.lifecycle {
            Lifecycle::Running(root) => Ok(root),
            Lifecycle::Uninitialized => Err(RegistryError::NotInitialized),
            Lifecycle::TornDown => Err(RegistryError::TornDown),
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_initialize(&mut self, root: Arc<RootProxy>) -> Result<(), RegistryError> {
        match self.lifecycle {
            Lifecycle::Uninitialized => {
                self.lifecycle = Lifecycle::Running(root);
                info!("Registry initialized");
                Ok(())
            }
            Lifecycle::Running(_) => {
                warn!("Registry initialized twice");
                Err(RegistryError::AlreadyInitialized)
            }
            Lifecycle::TornDown => Err(RegistryError::TornDown),
        }
    }

    fn handle_register_entity(&mut self, proxy: EntityProxy) -> Result<(), RegistryError> {
        self.running()?;
        let key = proxy.key();

        if self.entities.contains_key(&key) {
            debug!(key = %key, "Entity already registered, rejecting");
            return Err(RegistryError::EntityAlreadyExists(key));
        }

        // A network needs its interface; otherwise it would be an orphan
        // nobody can reach through the interface proxy.
        if let EntityProxy::Network(network) = &proxy {
            let parent = EntityKey::interface(network.interface_name());
            if !self.entities.contains_key(&parent) {
                debug!(key = %key, parent = %parent, "Parent interface not registered");
                return Err(RegistryError::EntityNotFound(parent));
            }
        }

        self.entities.insert(key.clone(), proxy);
        info!(key = %key, total_entities = self.entities.len(), "Entity registered");
        Ok(())
    }

    /// Removes an entity and, for an interface, every network under it.
    ///
    /// Callback registrations are left alone; see `ClearCallbacks`.
    fn handle_unregister_entity(
        &mut self,
        key: &EntityKey,
    ) -> Result<Vec<EntityProxy>, RegistryError> {
        self.running()?;

        let proxy = self
            .entities
            .remove(key)
            .ok_or_else(|| RegistryError::EntityNotFound(key.clone()))?;

        let mut removed = Vec::new();
        if let EntityProxy::Interface(iface) = &proxy {
            let mut children: Vec<EntityKey> = self
                .entities
                .keys()
                .filter(|child| child.is_network_of(iface.name()))
                .cloned()
                .collect();
            children.sort();

            for child in children {
                if let Some(child_proxy) = self.entities.remove(&child) {
                    debug!(key = %child, parent = %key, "Removing network with its interface");
                    removed.push(child_proxy);
                }
            }
        }
        removed.insert(0, proxy);

        info!(
            key = %key,
            cascaded = removed.len() - 1,
            total_entities = self.entities.len(),
            "Entity unregistered"
        );
        Ok(removed)
    }

    fn handle_lookup_entity(&self, key: &EntityKey) -> Result<EntityProxy, RegistryError> {
        self.running()?;
        self.entities
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::EntityNotFound(key.clone()))
    }

    fn handle_add_callback(
        &mut self,
        scope: Scope,
        observer: Arc<dyn Observer>,
    ) -> Result<(), RegistryError> {
        self.running()?;
        let observer_id = observer.id();

        if let Some(key) = scope.entity_key() {
            if !self.entities.contains_key(&key) {
                debug!(scope = %scope, "Callback scope has no registered entity");
                return Err(RegistryError::EntityNotFound(key));
            }
        }

        if self.callbacks.contains(&scope, observer_id) {
            debug!(scope = %scope, observer = %observer_id, "Callback already registered");
            return Err(RegistryError::CallbackAlreadyRegistered {
                scope,
                observer: observer_id,
            });
        }

        let monitor = self.arm_monitor(scope.clone(), observer.as_ref());
        let registration = CallbackRegistration::new(observer, monitor);
        if self.callbacks.insert(scope.clone(), registration).is_err() {
            return Err(RegistryError::CallbackAlreadyRegistered {
                scope,
                observer: observer_id,
            });
        }

        info!(
            scope = %scope,
            observer = %observer_id,
            total_callbacks = self.callbacks.len(),
            "Callback registered"
        );
        Ok(())
    }

    /// Arms a monitor that reports the observer's death back to this actor.
    ///
    /// The report is queued behind whatever command is running, so it can
    /// never interleave with a registration or snapshot in progress.
    fn arm_monitor(&self, scope: Scope, observer: &dyn Observer) -> LivenessMonitor {
        let observer_id = observer.id();
        let weak_sender = self.weak_sender.clone();

        LivenessMonitor::arm(observer_id, observer.death_signal(), move || async move {
            if let Some(sender) = weak_sender.upgrade() {
                let _ = sender
                    .send(RegistryCommand::ObserverDied { scope, observer_id })
                    .await;
            }
        })
    }

    fn handle_remove_callback(
        &mut self,
        scope: &Scope,
        observer_id: ObserverId,
        reason: RemovalReason,
    ) -> bool {
        match self.callbacks.remove(scope, observer_id) {
            Some(_) => {
                info!(
                    scope = %scope,
                    observer = %observer_id,
                    reason = %reason,
                    total_callbacks = self.callbacks.len(),
                    "Callback removed"
                );
                if reason == RemovalReason::ObserverDied {
                    // Other registrations of the same observer have their
                    // own monitors and are reported separately.
                    debug!(
                        observer = %observer_id,
                        remaining = ?self.callbacks.scopes_of(observer_id),
                        "Observer scopes still pending cleanup"
                    );
                }
                true
            }
            None => {
                debug!(
                    scope = %scope,
                    observer = %observer_id,
                    reason = %reason,
                    "Callback already gone"
                );
                false
            }
        }
    }

    fn handle_clear_callbacks(&mut self, scope: &Scope) -> usize {
        let removed = self.callbacks.clear(scope).len();
        if removed > 0 {
            info!(
                scope = %scope,
                removed,
                reason = %RemovalReason::Cleared,
                "Callbacks cleared"
            );
        }
        removed
    }

    fn handle_snapshot(&self) -> RegistrySnapshot {
        let mut entities: Vec<EntityKey> = self.entities.keys().cloned().collect();
        entities.sort_by(|a, b| {
            (a.kind() == EntityKind::Network, a).cmp(&(b.kind() == EntityKind::Network, b))
        });

        RegistrySnapshot {
            initialized: !matches!(self.lifecycle, Lifecycle::Uninitialized),
            torn_down: matches!(self.lifecycle, Lifecycle::TornDown),
            entities,
            callbacks: self.callbacks.counts(),
        }
    }

    fn handle_teardown(&mut self) -> Result<(), RegistryError> {
        self.running()?;

        let registrations = self.callbacks.drain();
        for (scope, registration) in &registrations {
            debug!(
                scope = %scope,
                observer = %registration.observer_id(),
                reason = %RemovalReason::Teardown,
                "Callback removed"
            );
        }
        let entities = self.entities.len();
        self.entities.clear();
        self.lifecycle = Lifecycle::TornDown;

        info!(
            entities,
            callbacks = registrations.len(),
            "Registry torn down"
        );
        Ok(())
    }
}
