//! Integration tests for observer death handling.
//!
//! A death signal reaches the registry asynchronously (monitor task, then
//! a queued command), so these tests poll the registry snapshot until the
//! expected registration count shows up.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::sync::Arc;
use std::time::Duration;

use sup_core::memory::InMemorySupplicant;
use sup_core::{InterfaceCore, InterfaceName, NetworkId, NetworkRequestKind, Scope, SupplicantEvent};
use supd::observer::Observer;
use supd::registry::{spawn_registry, RegistryHandle};
use supd::transport::{channel_observer, DEFAULT_DELIVERY_TIMEOUT};
use tokio::time::{sleep, timeout};

// ============================================================================
// Test Helpers
// ============================================================================

fn ifname(name: &str) -> InterfaceName {
    InterfaceName::new(name).unwrap()
}

/// Polls until `scope` holds `expected` registrations.
async fn wait_for_callback_count(handle: &RegistryHandle, scope: &Scope, expected: usize) {
    timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = handle.snapshot().await.unwrap();
            if snapshot.callback_count(scope) == expected {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{scope} never reached {expected} callbacks"));
}

/// Registry with interface "wlan0" and networks 0 and 1.
async fn create_wlan0_registry() -> (RegistryHandle, Arc<InMemorySupplicant>) {
    let handle = spawn_registry();
    let supplicant = Arc::new(InMemorySupplicant::new());
    handle.initialize(supplicant.clone()).await.unwrap();

    let iface = supplicant.add_interface(ifname("wlan0")).unwrap();
    handle.register_interface(iface.clone()).await.unwrap();
    for _ in 0..2 {
        let network_id = iface.add_network().unwrap();
        handle
            .register_network(iface.network(network_id).unwrap())
            .await
            .unwrap();
    }
    (handle, supplicant)
}

fn credential_request(network_id: NetworkId) -> SupplicantEvent {
    SupplicantEvent::NetworkRequest {
        ifname: ifname("wlan0"),
        network_id,
        request: NetworkRequestKind::EapIdentity,
    }
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[tokio::test]
async fn test_network_observer_death_scenario() {
    let (handle, _supplicant) = create_wlan0_registry().await;
    let network_id = NetworkId::new(1);
    let scope = Scope::network(ifname("wlan0"), network_id);

    let (observer, mut endpoint) = channel_observer(8, DEFAULT_DELIVERY_TIMEOUT);
    let death = observer.death_signal();
    handle.add_callback(scope.clone(), observer.clone()).await.unwrap();

    let outcome = handle
        .broadcast(scope.clone(), credential_request(network_id))
        .await
        .unwrap();
    assert_eq!(outcome.delivered, 1);

    // Received exactly once.
    let received = endpoint.recv().await.unwrap();
    assert_eq!(received.scope, scope);
    assert_eq!(received.event, credential_request(network_id));
    assert!(endpoint.try_recv().is_none());

    // The remote holder goes away.
    drop(endpoint);
    assert!(death.is_dead());
    wait_for_callback_count(&handle, &scope, 0).await;

    let outcome = handle
        .broadcast(scope.clone(), credential_request(network_id))
        .await
        .unwrap();
    assert_eq!(outcome.delivered, 0);
    assert_eq!(outcome.dropped, 0);
    assert!(!handle.remove_callback(scope, observer.id()).await.unwrap());
}

#[tokio::test]
async fn test_death_removes_observer_from_every_scope() {
    let (handle, _supplicant) = create_wlan0_registry().await;
    let scopes = [
        Scope::Global,
        Scope::interface(ifname("wlan0")),
        Scope::network(ifname("wlan0"), NetworkId::new(0)),
        Scope::network(ifname("wlan0"), NetworkId::new(1)),
    ];

    let (dying, dying_end) = channel_observer(8, DEFAULT_DELIVERY_TIMEOUT);
    let (survivor, _survivor_end) = channel_observer(8, DEFAULT_DELIVERY_TIMEOUT);
    for scope in &scopes {
        handle.add_callback(scope.clone(), dying.clone()).await.unwrap();
        handle.add_callback(scope.clone(), survivor.clone()).await.unwrap();
    }
    assert_eq!(handle.snapshot().await.unwrap().total_callbacks(), 8);

    drop(dying_end);

    for scope in &scopes {
        wait_for_callback_count(&handle, scope, 1).await;
    }
    for scope in &scopes {
        assert!(!handle.remove_callback(scope.clone(), dying.id()).await.unwrap());
        assert!(handle.remove_callback(scope.clone(), survivor.id()).await.unwrap());
    }
}

#[tokio::test]
async fn test_explicit_remove_racing_death() {
    let (handle, _supplicant) = create_wlan0_registry().await;
    let scope = Scope::interface(ifname("wlan0"));

    for _ in 0..20 {
        let (observer, endpoint) = channel_observer(8, DEFAULT_DELIVERY_TIMEOUT);
        handle.add_callback(scope.clone(), observer.clone()).await.unwrap();

        let remover = {
            let handle = handle.clone();
            let scope = scope.clone();
            let id = observer.id();
            tokio::spawn(async move { handle.remove_callback(scope, id).await })
        };
        drop(endpoint);

        // Whichever path wins, the registration goes away exactly once and
        // nothing else is disturbed.
        remover.await.unwrap().expect("remove should not error");
        wait_for_callback_count(&handle, &scope, 0).await;
    }

    let (observer, _endpoint) = channel_observer(8, DEFAULT_DELIVERY_TIMEOUT);
    handle.add_callback(scope.clone(), observer).await.unwrap();
    sleep(Duration::from_millis(20)).await;
    assert_eq!(handle.snapshot().await.unwrap().callback_count(&scope), 1);
}

#[tokio::test]
async fn test_reregistration_after_death_is_independent() {
    let (handle, _supplicant) = create_wlan0_registry().await;
    let scope = Scope::Global;

    let (observer, endpoint) = channel_observer(8, DEFAULT_DELIVERY_TIMEOUT);
    handle.add_callback(scope.clone(), observer).await.unwrap();
    drop(endpoint);
    wait_for_callback_count(&handle, &scope, 0).await;

    // A fresh observer in the same scope is not affected by the old death.
    let (fresh, mut fresh_end) = channel_observer(8, DEFAULT_DELIVERY_TIMEOUT);
    handle.add_callback(scope.clone(), fresh).await.unwrap();
    sleep(Duration::from_millis(20)).await;

    let outcome = handle
        .broadcast(
            scope,
            SupplicantEvent::InterfaceCreated {
                ifname: ifname("wlan1"),
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.delivered, 1);
    assert_eq!(fresh_end.drain().len(), 1);
}

#[tokio::test]
async fn test_observer_already_dead_at_registration() {
    let (handle, _supplicant) = create_wlan0_registry().await;
    let (observer, endpoint) = channel_observer(8, DEFAULT_DELIVERY_TIMEOUT);
    drop(endpoint);

    // The registration is accepted, then reaped by its monitor.
    handle.add_callback(Scope::Global, observer).await.unwrap();
    wait_for_callback_count(&handle, &Scope::Global, 0).await;
}

#[tokio::test]
async fn test_death_after_teardown_is_harmless() {
    let (handle, _supplicant) = create_wlan0_registry().await;
    let (observer, endpoint) = channel_observer(8, DEFAULT_DELIVERY_TIMEOUT);
    handle.add_callback(Scope::Global, observer).await.unwrap();

    handle.teardown().await.unwrap();
    drop(endpoint);
    sleep(Duration::from_millis(20)).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.torn_down);
    assert_eq!(snapshot.total_callbacks(), 0);
    assert!(handle.is_connected());
}
