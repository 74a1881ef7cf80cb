//! Proxy and callback registry using the Actor pattern.
//!
//! The registry is the single owner of every proxy object exposed to remote
//! callers and of every observer callback registered against them. It
//! receives commands via a tokio mpsc channel and processes them one at a
//! time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  Daemon core /  │────▶│  RegistryActor  │◀────│ LivenessMonitor  │
//! │  remote proxies │     │                 │     │ (one per callback)│
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                       │                        ▲
//!         │   RegistryCommand     │  HashMap<EntityKey,    │ DeathSignal
//!         │   (mpsc channel)      │  EntityProxy>          │
//!         ▼                       │  CallbackTable         │
//!    broadcast: snapshot ─────────┘                        │
//!    then deliver to each Observer ──(failure)──▶ remove ──┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;

mod actor;
mod callbacks;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use callbacks::{CallbackRegistration, CallbackTable};
pub use commands::{
    BroadcastOutcome, ErrorKind, RegistryCommand, RegistryError, RegistrySnapshot, RemovalReason,
};
pub use handle::RegistryHandle;

/// Default command channel buffer size
pub const DEFAULT_COMMAND_BUFFER: usize = 100;

/// Spawn the registry actor with the default buffer size.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use sup_core::memory::InMemorySupplicant;
/// use supd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let registry = spawn_registry();
///     let root = registry
///         .initialize(Arc::new(InMemorySupplicant::new()))
///         .await;
///     assert!(root.is_ok());
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    spawn_registry_with_buffer(DEFAULT_COMMAND_BUFFER)
}

/// Spawn the registry actor and return a handle for interaction.
///
/// A zero `buffer` is bumped to 1.
pub fn spawn_registry_with_buffer(buffer: usize) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(buffer.max(1));

    let actor = RegistryActor::new(cmd_rx, cmd_tx.downgrade());
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
