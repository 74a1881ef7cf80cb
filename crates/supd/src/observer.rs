//! The observer seam between the registry and the transport layer.
//!
//! The registry only needs two things from a remote observer reference:
//! a way to deliver one event ([`Observer::deliver`]) and a way to learn
//! that the remote holder is gone ([`Observer::death_signal`]). Any
//! transport that can provide both can be plugged in.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sup_core::EventEnvelope;
use thiserror::Error;

use crate::liveness::DeathSignal;

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an observer reference.
///
/// Two registrations with the same scope and `ObserverId` are the same
/// registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObserverId(u64);

impl ObserverId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a process-unique id.
    pub fn fresh() -> Self {
        Self(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obs-{}", self.0)
    }
}

/// Why an event could not be handed to an observer.
///
/// The registry treats every variant the same way: the registration is
/// dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("observer unreachable: {0}")]
    Unreachable(String),

    #[error("delivery timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("observer rejected event: {0}")]
    Rejected(String),
}

/// A remote reference that receives events for the scopes it registered.
#[async_trait]
pub trait Observer: Send + Sync {
    fn id(&self) -> ObserverId;

    /// Sends one event to the remote holder.
    async fn deliver(&self, envelope: &EventEnvelope) -> Result<(), DeliveryError>;

    /// Signal fired once by the transport when the remote holder is
    /// unreachable. Every call returns a handle to the same signal.
    fn death_signal(&self) -> DeathSignal;
}

impl fmt::Debug for dyn Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer").field("id", &self.id()).finish()
    }
}
