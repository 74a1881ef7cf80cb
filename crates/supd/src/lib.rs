//! supd - remote-object registry for the supplicant daemon
//!
//! This crate exposes daemon-internal entities to remote observers:
//! - `registry` - actor owning every proxy and callback registration
//! - `proxy` - the root, interface and network proxies remote callers use
//! - `liveness` - death signals and the monitors that watch them
//! - `observer` - the seam a transport implements to receive events
//! - `transport` - in-process channel transport
//! - `feed` - turns daemon-core notifications into registry calls
//! - `config` - TOML configuration for the daemon binary
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        supd daemon                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  daemon core    │────▶│       EventFeed             │   │
//! │  │ (CoreNotifier)  │     │  (register / broadcast)     │   │
//! │  └─────────────────┘     └──────────────┬──────────────┘   │
//! │                                         │                   │
//! │  ┌─────────────────┐                    ▼                   │
//! │  │  Root/Interface │     ┌─────────────────────────────┐   │
//! │  │  /NetworkProxy  │────▶│      RegistryActor          │   │
//! │  └─────────────────┘     │ (entities + callbacks)      │   │
//! │                          └──────────────┬──────────────┘   │
//! │                                         │ observers         │
//! │                                         ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ LivenessMonitor │◀────│   Observer (transport)      │   │
//! │  │ (per callback)  │     │   deliver / death_signal    │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod feed;
pub mod liveness;
pub mod observer;
pub mod proxy;
pub mod registry;
pub mod transport;
