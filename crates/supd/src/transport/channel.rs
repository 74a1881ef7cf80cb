//! In-process channel transport.
//!
//! [`channel_observer`] returns a registry-side [`ChannelObserver`] and the
//! remote-side [`ObserverEndpoint`] that receives its events. Dropping the
//! endpoint is the remote holder going away: the observer's death signal
//! fires and any delivery after that fails.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sup_core::EventEnvelope;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

use crate::liveness::DeathSignal;
use crate::observer::{DeliveryError, Observer, ObserverId};

/// Default time a delivery may wait for room in a full endpoint queue.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Creates a connected observer/endpoint pair.
///
/// `buffer` is the number of undelivered events the endpoint may queue
/// (bumped to 1 if zero); a delivery that finds the queue full waits up
/// to `delivery_timeout`.
pub fn channel_observer(
    buffer: usize,
    delivery_timeout: Duration,
) -> (Arc<ChannelObserver>, ObserverEndpoint) {
    let (sender, receiver) = mpsc::channel(buffer.max(1));
    let id = ObserverId::fresh();
    let death = DeathSignal::new();

    let observer = Arc::new(ChannelObserver {
        id,
        sender,
        death: death.clone(),
        delivery_timeout,
    });
    let endpoint = ObserverEndpoint {
        id,
        receiver,
        death,
    };
    (observer, endpoint)
}

/// Registry-side half: an [`Observer`] writing into a channel.
pub struct ChannelObserver {
    id: ObserverId,
    sender: mpsc::Sender<EventEnvelope>,
    death: DeathSignal,
    delivery_timeout: Duration,
}

#[async_trait]
impl Observer for ChannelObserver {
    fn id(&self) -> ObserverId {
        self.id
    }

    async fn deliver(&self, envelope: &EventEnvelope) -> Result<(), DeliveryError> {
        match timeout(self.delivery_timeout, self.sender.send(envelope.clone())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => {
                // The endpoint is gone; make sure liveness hears about it too.
                self.death.notify_dead();
                Err(DeliveryError::Unreachable("endpoint dropped".to_string()))
            }
            Err(_) => Err(DeliveryError::Timeout(self.delivery_timeout)),
        }
    }

    fn death_signal(&self) -> DeathSignal {
        self.death.clone()
    }
}

/// Remote-side half: receives the events delivered to its observer.
pub struct ObserverEndpoint {
    id: ObserverId,
    receiver: mpsc::Receiver<EventEnvelope>,
    death: DeathSignal,
}

impl ObserverEndpoint {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Waits for the next event. `None` once the observer side is dropped.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.receiver.recv().await
    }

    /// Returns a queued event without waiting.
    pub fn try_recv(&mut self) -> Option<EventEnvelope> {
        self.receiver.try_recv().ok()
    }

    /// Drains every event queued right now.
    pub fn drain(&mut self) -> Vec<EventEnvelope> {
        let mut events = Vec::new();
        while let Some(envelope) = self.try_recv() {
            events.push(envelope);
        }
        events
    }
}

impl Drop for ObserverEndpoint {
    fn drop(&mut self) {
        debug!(observer = %self.id, "Observer endpoint dropped");
        self.receiver.close();
        self.death.notify_dead();
    }
}
