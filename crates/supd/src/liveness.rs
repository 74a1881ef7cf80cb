//! Liveness monitoring for observer references.
//!
//! A [`DeathSignal`] is the transport's "this remote holder is gone"
//! notification. A [`LivenessMonitor`] watches one signal on behalf of one
//! callback registration and runs a cleanup future exactly once when the
//! signal fires.
//!
//! # State Machine
//!
//! ```text
//!   Armed ──(death signal)──▶ Fired ──(cleanup done)──▶ Disarmed
//!     │                                                    ▲
//!     └──────────────────(disarm / drop)───────────────────┘
//! ```
//!
//! `Disarmed` is terminal. The Armed → Fired transition is a single
//! compare-and-swap, so a death signal racing an explicit disarm runs the
//! cleanup either once or not at all.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::observer::ObserverId;

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const DISARMED: u8 = 2;

/// One-shot notification that an observer's connection is dead.
///
/// Cheap to clone; all clones share the same state. Once fired it stays
/// fired.
#[derive(Clone, Default)]
pub struct DeathSignal(CancellationToken);

impl DeathSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the remote holder as unreachable. Idempotent.
    pub fn notify_dead(&self) {
        self.0.cancel();
    }

    pub fn is_dead(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Completes once the signal has fired.
    pub async fn dead(&self) {
        self.0.cancelled().await;
    }
}

impl fmt::Debug for DeathSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeathSignal")
            .field("dead", &self.is_dead())
            .finish()
    }
}

/// Observable state of a [`LivenessMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Armed,
    Fired,
    Disarmed,
}

impl MonitorState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            ARMED => Self::Armed,
            FIRED => Self::Fired,
            _ => Self::Disarmed,
        }
    }
}

/// Watches one observer's [`DeathSignal`] for one registration.
///
/// Dropping the monitor disarms it.
pub struct LivenessMonitor {
    observer: ObserverId,
    state: Arc<AtomicU8>,
    disarm: CancellationToken,
}

impl LivenessMonitor {
    /// Arms a monitor on `signal`. `cleanup` runs at most once, on a
    /// spawned task, if the signal fires before the monitor is disarmed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F, Fut>(observer: ObserverId, signal: DeathSignal, cleanup: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(ARMED));
        let disarm = CancellationToken::new();

        let task_state = Arc::clone(&state);
        let task_disarm = disarm.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = task_disarm.cancelled() => {}

                _ = signal.dead() => {
                    if task_state
                        .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        debug!(observer = %observer, "Observer died, running cleanup");
                        cleanup().await;
                        task_state.store(DISARMED, Ordering::Release);
                    }
                }
            }
        });

        Self {
            observer,
            state,
            disarm,
        }
    }

    /// Stops watching. Returns true if the monitor was still armed, i.e.
    /// the cleanup will never run.
    pub fn disarm(&self) -> bool {
        let previous = self.state.swap(DISARMED, Ordering::AcqRel);
        self.disarm.cancel();
        previous == ARMED
    }

    pub fn state(&self) -> MonitorState {
        MonitorState::from_raw(self.state.load(Ordering::Acquire))
    }
}

impl Drop for LivenessMonitor {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl fmt::Debug for LivenessMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LivenessMonitor")
            .field("observer", &self.observer)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;

    fn counting_cleanup(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> std::future::Ready<()> {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    async fn settle() {
        sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_death_fires_cleanup_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let signal = DeathSignal::new();
        let monitor = LivenessMonitor::arm(
            ObserverId::new(1),
            signal.clone(),
            counting_cleanup(&counter),
        );
        assert_eq!(monitor.state(), MonitorState::Armed);

        signal.notify_dead();
        signal.notify_dead();
        settle().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.state(), MonitorState::Disarmed);
        assert!(!monitor.disarm(), "already fired, nothing left to disarm");
    }

    #[tokio::test]
    async fn test_disarm_prevents_cleanup() {
        let counter = Arc::new(AtomicUsize::new(0));
        let signal = DeathSignal::new();
        let monitor = LivenessMonitor::arm(
            ObserverId::new(2),
            signal.clone(),
            counting_cleanup(&counter),
        );

        assert!(monitor.disarm());
        assert!(!monitor.disarm());
        assert_eq!(monitor.state(), MonitorState::Disarmed);

        signal.notify_dead();
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drop_disarms() {
        let counter = Arc::new(AtomicUsize::new(0));
        let signal = DeathSignal::new();
        let monitor = LivenessMonitor::arm(
            ObserverId::new(3),
            signal.clone(),
            counting_cleanup(&counter),
        );
        drop(monitor);

        signal.notify_dead();
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_already_dead_signal_fires_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let signal = DeathSignal::new();
        signal.notify_dead();

        let _monitor =
            LivenessMonitor::arm(ObserverId::new(4), signal, counting_cleanup(&counter));
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_signal_many_monitors() {
        let counter = Arc::new(AtomicUsize::new(0));
        let signal = DeathSignal::new();
        let monitors: Vec<_> = (0..3)
            .map(|_| {
                LivenessMonitor::arm(
                    ObserverId::new(5),
                    signal.clone(),
                    counting_cleanup(&counter),
                )
            })
            .collect();

        signal.notify_dead();
        settle().await;

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(monitors.iter().all(|m| m.state() == MonitorState::Disarmed));
    }

    #[test]
    fn test_death_signal_clones_share_state() {
        let signal = DeathSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_dead());
        signal.notify_dead();
        assert!(clone.is_dead());
    }
}
