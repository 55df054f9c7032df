use std::sync::{Mutex, MutexGuard};

// ===============================================================================================
// Environment
// ===============================================================================================
#[doc(hidden)]
pub(crate) fn read_env(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) => value,
        Err(_) => default.to_string(),
    }
}

// ===============================================================================================
// Host name
// ===============================================================================================
lazy_static! {
    static ref LOCAL_HOSTNAME: String = {
        let configured = read_env("LOOPBACK_HOSTNAME", "");
        let hostname = if configured.is_empty() {
            fully_qualified(&gethostname::gethostname().to_string_lossy())
        } else {
            configured
        };
        tracing::debug!("Using '{}' as the remote address of loopback requests", hostname);
        hostname
    };
}

/// Qualifies a host name with its domain: the first name its addresses reverse-resolve to
/// that contains a dot. Returns `name` unchanged if there is none or resolution fails.
pub(crate) fn fully_qualified(name: &str) -> String {
    let addresses = match dns_lookup::lookup_host(name) {
        Ok(addresses) => addresses,
        Err(err) => {
            tracing::debug!("Cannot resolve host name '{}': {}", name, err);
            return name.to_string();
        }
    };

    let names = addresses
        .into_iter()
        .filter_map(|ip| dns_lookup::lookup_addr(&ip).ok());
    first_qualified(name, names)
}

fn first_qualified<I: IntoIterator<Item = String>>(name: &str, candidates: I) -> String {
    candidates
        .into_iter()
        .find(|candidate| candidate.contains('.'))
        .unwrap_or_else(|| name.to_string())
}

/// The local host name that every loopback request reports as its remote address.
/// It is determined once per process and never changes afterwards. Set the environment
/// variable `LOOPBACK_HOSTNAME` before the first request to override it.
pub fn local_hostname() -> &'static str {
    LOCAL_HOSTNAME.as_str()
}

// ===============================================================================================
// HTTP
// ===============================================================================================

/// Looks up the standard reason phrase for a status code. Returns `None` for codes
/// without a registered phrase.
pub fn reason_phrase(status_code: u16) -> Option<&'static str> {
    http::StatusCode::from_u16(status_code)
        .ok()
        .and_then(|status| status.canonical_reason())
}

// ===============================================================================================
// Locks
// ===============================================================================================

// A panic in user code must not wedge the loopback state for every later test.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
