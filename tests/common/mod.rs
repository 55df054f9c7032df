use httploopback::{AddressRegistry, ApplicationError, ApplicationResponse, Invocation, Loopback};
use serde_json::json;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// An application that answers every request with a JSON description of the invocation it
/// received.
pub fn echo(inv: Invocation) -> Result<ApplicationResponse, ApplicationError> {
    let body = String::from_utf8_lossy(&inv.body).to_string();
    let value = json!({
        "method": inv.method,
        "path": inv.path,
        "headers": inv.headers,
        "body": body,
        "base_url": inv.base_url,
        "remote_addr": inv.remote_addr,
    });
    Ok(ApplicationResponse::json(200, &value)?)
}

/// Counts how often the application behind a loopback was invoked.
#[derive(Clone, Default)]
pub struct Sentinel {
    calls: Arc<AtomicUsize>,
}

impl Sentinel {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// A loopback whose application bumps this sentinel and then behaves like [echo].
    pub fn loopback(&self) -> Loopback {
        self.loopback_with(AddressRegistry::global())
    }

    pub fn loopback_with(&self, registry: Arc<AddressRegistry>) -> Loopback {
        let calls = self.calls.clone();
        let app = move |inv: Invocation| -> Result<ApplicationResponse, ApplicationError> {
            calls.fetch_add(1, Ordering::SeqCst);
            echo(inv)
        };
        Loopback::with_registry(app, registry)
    }
}
