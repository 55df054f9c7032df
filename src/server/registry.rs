use crate::{
    common::data::{Address, Error, Error::NotRegistered, IntoAddress, PendingRequest},
    server::{cookies::CookieJar, handler::LoopbackHandler, response::TranslatedResponse},
};
use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<AddressRegistry> = Arc::new(AddressRegistry::new());
}

/// An address that is currently served in-process.
#[derive(Clone)]
pub struct LoopbackTarget {
    address: Address,
    use_ssl: bool,
    handler: Arc<LoopbackHandler>,
}

impl LoopbackTarget {
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn use_ssl(&self) -> bool {
        self.use_ssl
    }

    pub fn handler(&self) -> &Arc<LoopbackHandler> {
        &self.handler
    }
}

/// Maps active addresses to the handlers that serve them.
///
/// Activation and deactivation take a short write lock. Dispatching only reads the table and
/// releases the lock before the handler runs, so requests against active addresses can be
/// served concurrently.
///
/// The addresses a handler owns are always derived from this table; a handler can never
/// believe it owns an address the table assigns elsewhere.
#[derive(Default)]
pub struct AddressRegistry {
    targets: RwLock<BTreeMap<Address, LoopbackTarget>>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<AddressRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<Address, LoopbackTarget>> {
        self.targets.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<Address, LoopbackTarget>> {
        self.targets.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Routes requests for `address` to `handler`. An address that is already active is
    /// taken over by the new handler.
    pub fn activate<A: IntoAddress>(
        &self,
        address: A,
        handler: &Arc<LoopbackHandler>,
        use_ssl: bool,
    ) -> Result<Address, Error> {
        let address = address.into_address()?;
        let target = LoopbackTarget {
            address: address.clone(),
            use_ssl,
            handler: handler.clone(),
        };

        let previous = self.write().insert(address.clone(), target);
        if previous.is_some() {
            tracing::debug!("Loopback address {} was already active, replacing it", address);
        } else {
            tracing::debug!("Activated loopback address {} (ssl={})", address, use_ssl);
        }

        Ok(address)
    }

    /// Stops routing requests for `address`. Fails if `handler` does not serve it.
    pub fn deactivate<A: IntoAddress>(
        &self,
        address: A,
        handler: &Arc<LoopbackHandler>,
    ) -> Result<(), Error> {
        let address = address.into_address()?;
        let mut targets = self.write();

        let owned = targets
            .get(&address)
            .map(|t| Arc::ptr_eq(&t.handler, handler))
            .unwrap_or(false);
        if !owned {
            return Err(NotRegistered(address));
        }

        targets.remove(&address);
        tracing::debug!("Deactivated loopback address {}", address);
        Ok(())
    }

    /// Deactivates every address `handler` serves and returns them.
    pub fn deactivate_all(&self, handler: &Arc<LoopbackHandler>) -> Vec<Address> {
        let mut targets = self.write();

        let owned: Vec<Address> = targets
            .iter()
            .filter(|(_, t)| Arc::ptr_eq(&t.handler, handler))
            .map(|(a, _)| a.clone())
            .collect();

        for address in &owned {
            targets.remove(address);
            tracing::debug!("Deactivated loopback address {}", address);
        }

        owned
    }

    pub fn lookup(&self, address: &Address) -> Option<LoopbackTarget> {
        self.read().get(address).cloned()
    }

    pub fn is_active(&self, address: &Address) -> bool {
        self.read().contains_key(address)
    }

    pub fn is_ssl(&self, address: &Address) -> Option<bool> {
        self.read().get(address).map(|t| t.use_ssl)
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.read().keys().cloned().collect()
    }

    pub fn addresses_of(&self, handler: &Arc<LoopbackHandler>) -> Vec<Address> {
        self.read()
            .iter()
            .filter(|(_, t)| Arc::ptr_eq(&t.handler, handler))
            .map(|(a, _)| a.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Deactivates all addresses of all handlers.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Serves an outgoing request addressed to `address` with the handler registered for it.
    /// This is the entry point for code that intercepts connection attempts.
    pub fn dispatch<A: IntoAddress>(
        &self,
        address: A,
        session: Option<&dyn CookieJar>,
        url: &str,
        request: PendingRequest,
    ) -> Result<TranslatedResponse, Error> {
        let address = address.into_address()?;
        let target = self
            .lookup(&address)
            .ok_or_else(|| NotRegistered(address.clone()))?;

        target.handler.handle_request(session, url, request)
    }
}
