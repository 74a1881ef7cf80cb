//! Event feed from the daemon core into the registry.
//!
//! The daemon core reports lifecycle and state changes through a
//! [`CoreNotifier`]; [`FeedNotifier`] queues them on an unbounded channel
//! so the core never blocks. [`EventFeed`] drains that channel and turns
//! each [`CoreEvent`] into registry calls:
//!
//! | Core event         | Registry effect                                          |
//! |--------------------|----------------------------------------------------------|
//! | `InterfaceAdded`   | register proxy, `InterfaceCreated` to global observers   |
//! | `InterfaceRemoved` | unregister proxy and networks, then clear all their callbacks |
//! | `NetworkAdded`     | register proxy, `NetworkAdded` to interface observers    |
//! | `NetworkRemoved`   | unregister proxy, then clear its callbacks               |
//! | `StateChanged`     | broadcast to interface observers                         |
//! | `NetworkRequest`   | broadcast to network observers                           |
//!
//! Callbacks are cleared only after the removal events have gone out, so
//! observers of a vanishing entity still receive its final event.

use sup_core::{CoreEvent, CoreNotifier, Scope, SupplicantEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::{RegistryError, RegistryHandle};

/// [`CoreNotifier`] that queues events for an [`EventFeed`].
#[derive(Clone)]
pub struct FeedNotifier {
    sender: mpsc::UnboundedSender<CoreEvent>,
}

impl CoreNotifier for FeedNotifier {
    fn notify(&self, event: CoreEvent) {
        if self.sender.send(event).is_err() {
            debug!("Event feed closed, dropping core event");
        }
    }
}

/// Creates a notifier and the receiver an [`EventFeed`] drains.
pub fn feed_channel() -> (FeedNotifier, mpsc::UnboundedReceiver<CoreEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (FeedNotifier { sender }, receiver)
}

/// Applies core events to the registry.
#[derive(Clone, Debug)]
pub struct EventFeed {
    registry: RegistryHandle,
}

impl EventFeed {
    pub fn new(registry: RegistryHandle) -> Self {
        Self { registry }
    }

    /// Applies one event.
    pub async fn apply(&self, event: CoreEvent) -> Result<(), RegistryError> {
        match event {
            CoreEvent::InterfaceAdded(core) => {
                self.registry.register_interface(core).await?;
            }
            CoreEvent::InterfaceRemoved(ifname) => {
                let cascaded = self.registry.unregister_interface(&ifname).await?;
                for network_id in cascaded {
                    self.registry
                        .clear_callbacks(Scope::network(ifname.clone(), network_id))
                        .await?;
                }
                self.registry
                    .clear_callbacks(Scope::interface(ifname))
                    .await?;
            }
            CoreEvent::NetworkAdded(core) => {
                self.registry.register_network(core).await?;
            }
            CoreEvent::NetworkRemoved { ifname, network_id } => {
                self.registry.unregister_network(&ifname, network_id).await?;
                self.registry
                    .clear_callbacks(Scope::network(ifname, network_id))
                    .await?;
            }
            CoreEvent::StateChanged {
                ifname,
                state,
                bssid,
                network_id,
                ssid,
            } => {
                let event = SupplicantEvent::StateChanged {
                    ifname,
                    state,
                    bssid,
                    network_id,
                    ssid,
                };
                self.registry.broadcast(event.natural_scope(), event).await?;
            }
            CoreEvent::NetworkRequest {
                ifname,
                network_id,
                request,
            } => {
                let event = SupplicantEvent::NetworkRequest {
                    ifname,
                    network_id,
                    request,
                };
                self.registry.broadcast(event.natural_scope(), event).await?;
            }
        }
        Ok(())
    }

    /// Drains `receiver` until it closes or `cancel_token` fires.
    ///
    /// Errors are logged and the feed keeps going.
    pub async fn run(
        self,
        mut receiver: mpsc::UnboundedReceiver<CoreEvent>,
        cancel_token: CancellationToken,
    ) {
        info!("Event feed starting");

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("Event feed shutting down");
                    break;
                }

                event = receiver.recv() => {
                    let Some(event) = event else {
                        debug!("Event feed channel closed");
                        break;
                    };
                    let kind = event.kind();
                    if let Err(e) = self.apply(event).await {
                        warn!(event = kind, error = %e, "Failed to apply core event");
                    }
                }
            }
        }

        info!("Event feed stopped");
    }
}

/// Spawns an [`EventFeed`] on its own task.
pub fn spawn_feed(
    registry: RegistryHandle,
    receiver: mpsc::UnboundedReceiver<CoreEvent>,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(EventFeed::new(registry).run(receiver, cancel_token))
}
