//! Transports that carry events to observers.
//!
//! The registry only depends on the [`Observer`](crate::observer::Observer)
//! trait. This module holds the in-process channel transport used by the
//! daemon binary and the tests; socket or bus transports implement the same
//! trait and fire the observer's death signal when their peer disconnects.

mod channel;

pub use channel::{channel_observer, ChannelObserver, ObserverEndpoint, DEFAULT_DELIVERY_TIMEOUT};
