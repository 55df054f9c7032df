use crate::common::{echo, Sentinel};
use httploopback::{AddressRegistry, Error, IntoAddress, Loopback, PendingRequest};
use serde_json::Value;
use std::sync::Arc;

fn isolated() -> (Arc<AddressRegistry>, Loopback) {
    let registry = Arc::new(AddressRegistry::new());
    let loopback = Loopback::with_registry(echo, registry.clone());
    (registry, loopback)
}

#[test]
fn activate_then_deactivate_restores_registry_test() {
    let _ = env_logger::try_init();
    let (registry, loopback) = isolated();
    let other = Loopback::with_registry(echo, registry.clone());
    other.activate(("other.local", 80), false).unwrap();
    let before = registry.addresses();

    for address in [("example.com", 80), ("example.com", 443), ("127.0.0.1", 5000)] {
        loopback.activate(address, false).unwrap();
        assert!(registry.is_active(&address.into_address().unwrap()));
        loopback.deactivate(address).unwrap();
        assert_eq!(registry.addresses(), before);
    }
}

#[test]
fn deactivate_all_releases_every_owned_address_test() {
    let (registry, loopback) = isolated();

    for port in 9000..9010 {
        loopback.activate(("localhost", port), false).unwrap();
    }
    assert_eq!(loopback.active_addresses().len(), 10);
    assert_eq!(registry.len(), 10);

    loopback.deactivate_all();
    assert!(loopback.active_addresses().is_empty());
    assert!(registry.is_empty());

    // Safe to repeat when nothing is owned.
    loopback.deactivate_all();
    assert!(registry.is_empty());
}

#[test]
fn double_activation_is_last_writer_wins_test() {
    let (registry, loopback) = isolated();
    let address = "localhost:7000".into_address().unwrap();

    loopback.activate(&address, false).unwrap();
    loopback.activate(&address, true).unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.is_ssl(&address), Some(true));

    loopback.deactivate(&address).unwrap();
    assert!(!registry.is_active(&address));
    assert!(matches!(
        loopback.deactivate(&address),
        Err(Error::NotRegistered(_))
    ));
}

#[test]
fn takeover_by_another_loopback_test() {
    let (registry, first) = isolated();
    let second = Loopback::with_registry(echo, registry.clone());

    first.activate(("shared.local", 80), false).unwrap();
    second.activate(("shared.local", 80), false).unwrap();

    assert!(first.active_addresses().is_empty());
    assert_eq!(second.active_addresses().len(), 1);
    assert!(first.deactivate(("shared.local", 80)).is_err());

    first.deactivate_all();
    assert_eq!(registry.len(), 1);
}

#[test]
fn deactivating_an_inactive_address_fails_test() {
    let (_, loopback) = isolated();
    let result = loopback.deactivate(("never.local", 80));
    assert!(matches!(result, Err(Error::NotRegistered(_))));
}

#[test]
fn invalid_addresses_are_rejected_test() {
    let (registry, loopback) = isolated();

    assert!(matches!(loopback.activate("localhost", false), Err(Error::InvalidAddress(_))));
    assert!(matches!(loopback.activate(("", 80), false), Err(Error::InvalidAddress(_))));
    assert!(matches!(loopback.deactivate("localhost:port"), Err(Error::InvalidAddress(_))));
    assert!(registry.is_empty());
}

#[test]
fn dispatch_routes_to_the_registered_handler_test() {
    let registry = Arc::new(AddressRegistry::new());
    let first = Sentinel::default();
    let second = Sentinel::default();
    let first_loopback = first.loopback_with(registry.clone());
    let second_loopback = second.loopback_with(registry.clone());
    first_loopback.activate(("first.local", 80), false).unwrap();
    second_loopback.activate(("second.local", 80), false).unwrap();

    let url = "http://second.local/hello";
    let res = registry
        .dispatch(("second.local", 80), None, url, PendingRequest::new("GET", url))
        .unwrap();

    assert_eq!(res.status_code, 200);
    assert_eq!(first.calls(), 0);
    assert_eq!(second.calls(), 1);
}

#[test]
fn dispatch_to_an_inactive_address_fails_test() {
    let (registry, _loopback) = isolated();

    let url = "http://nobody.local/";
    let result = registry.dispatch(("nobody.local", 80), None, url, PendingRequest::new("GET", url));
    assert!(matches!(result, Err(Error::NotRegistered(_))));
}

#[test]
fn ssl_flag_is_recorded_but_does_not_change_translation_test() {
    let (registry, loopback) = isolated();
    let address = loopback.activate(("secure.local", 443), true).unwrap();

    assert_eq!(registry.is_ssl(&address), Some(true));
    assert!(registry.lookup(&address).unwrap().use_ssl());

    let url = "http://secure.local:443/x";
    let res = registry
        .dispatch(&address, None, url, PendingRequest::new("GET", url))
        .unwrap();
    let body: Value = res.json().unwrap();
    assert_eq!(body["base_url"], "http://secure.local:443");
}

#[test]
fn dropping_a_loopback_releases_its_addresses_test() {
    let (registry, loopback) = isolated();
    loopback.activate(("a.local", 80), false).unwrap();
    loopback.activate(("b.local", 80), false).unwrap();
    assert_eq!(registry.len(), 2);

    drop(loopback);
    assert!(registry.is_empty());
}

#[test]
fn global_registry_serves_loopbacks_created_with_new_test() {
    let loopback = Loopback::from_fn(echo);
    let address = ("global-registry-test.local", 8123);
    loopback.activate(address, false).unwrap();

    let url = "http://global-registry-test.local:8123/ping";
    let res = AddressRegistry::global()
        .dispatch(address, None, url, PendingRequest::new("GET", url))
        .unwrap();
    let body: Value = res.json().unwrap();
    assert_eq!(body["path"], "/ping");

    drop(loopback);
    assert!(!AddressRegistry::global().is_active(&address.into_address().unwrap()));
}
