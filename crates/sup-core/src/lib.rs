//! sup core - shared types for the supplicant remote-object registry
//!
//! This crate provides the domain types shared between the daemon-internal
//! state (interfaces, networks, the global supplicant context) and the
//! registry that exposes that state to remote observers (`supd`).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod entity;
pub mod error;
pub mod event;
pub mod ident;
pub mod key;
pub mod memory;
pub mod scope;

// Re-exports for convenience
pub use entity::{CoreEvent, CoreNotifier, InterfaceCore, NetworkCore, SupplicantCore};
pub use error::{CoreError, CoreResult, DomainError, DomainResult};
pub use event::{DebugLevel, EventEnvelope, NetworkRequestKind, SupplicantEvent, SupplicantState};
pub use ident::{InterfaceName, NetworkId, MAX_INTERFACE_NAME_LEN};
pub use key::{EntityKey, EntityKind, KEY_SEPARATOR};
pub use scope::Scope;
