use crate::common::echo;
use httploopback::{AddressRegistry, Error, IntoAddress, Loopback, PendingRequest};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

fn isolated() -> (Arc<AddressRegistry>, Loopback) {
    let registry = Arc::new(AddressRegistry::new());
    let loopback = Loopback::with_registry(echo, registry.clone());
    (registry, loopback)
}

#[test]
fn scope_serves_and_then_releases_the_address_test() {
    let _ = env_logger::try_init();
    let (registry, loopback) = isolated();

    {
        let active = loopback.on(("scoped.local", 80), false).unwrap();
        assert_eq!(active.address().to_string(), "scoped.local:80");

        let url = "http://scoped.local/inside";
        let res = registry
            .dispatch(("scoped.local", 80), None, url, PendingRequest::new("GET", url))
            .unwrap();
        assert_eq!(res.status_code, 200);
    }

    assert!(registry.is_empty());
}

#[test]
fn scope_is_released_on_early_return_test() {
    let (registry, loopback) = isolated();

    fn serve(loopback: &Loopback) -> Result<u16, Error> {
        let active = loopback.on(("early.local", 80), false)?;
        let res = active.handle_request(None, "no scheme", PendingRequest::new("GET", "/"))?;
        Ok(res.status_code)
    }

    assert!(matches!(serve(&loopback), Err(Error::MalformedUrl(_))));
    assert!(registry.is_empty());
}

#[test]
fn scope_is_released_on_panic_test() {
    let (registry, loopback) = isolated();

    let result = catch_unwind(AssertUnwindSafe(|| {
        let _active = loopback.on(("panic.local", 80), false).unwrap();
        panic!("test failure inside the scope");
    }));

    assert!(result.is_err());
    assert!(registry.is_empty());
}

#[test]
fn scope_tolerates_the_address_being_released_elsewhere_test() {
    let (registry, loopback) = isolated();

    {
        let active = loopback.on(("moved.local", 80), false).unwrap();
        active.deactivate(("moved.local", 80)).unwrap();
        active.activate(("extra.local", 80), false).unwrap();
    }

    // Only the scoped address is released by the guard.
    let remaining = registry.addresses();
    assert_eq!(remaining, vec![("extra.local", 80).into_address().unwrap()]);
}

#[test]
fn scope_rejects_invalid_addresses_test() {
    let (registry, loopback) = isolated();

    assert!(matches!(loopback.on("not-an-address", false), Err(Error::InvalidAddress(_))));
    assert!(registry.is_empty());
}
