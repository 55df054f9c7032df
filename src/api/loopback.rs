use crate::{
    api::Application,
    common::data::{
        Address, ApplicationError, ApplicationResponse, Error, IntoAddress, Invocation,
        PendingRequest,
    },
    server::{
        cookies::CookieJar, handler::LoopbackHandler, intercept::InterceptHandler,
        registry::AddressRegistry, response::TranslatedResponse,
    },
};
use std::{ops::Deref, sync::Arc};

/// Serves requests to one or more addresses from an in-process application.
///
/// While an address is active, every outgoing request addressed to it that reaches the
/// [AddressRegistry] is answered by this loopback's application instead of a real server.
/// All addresses still active are deactivated when the `Loopback` is dropped.
pub struct Loopback {
    handler: Arc<LoopbackHandler>,
    registry: Arc<AddressRegistry>,
}

impl Loopback {
    /// Creates a loopback that activates addresses on the process-wide registry.
    pub fn new<A: Application + 'static>(application: A) -> Self {
        Self::with_registry(application, AddressRegistry::global())
    }

    /// Creates a loopback from a function that serves invocations.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Invocation) -> Result<ApplicationResponse, ApplicationError> + Send + Sync + 'static,
    {
        Self::new(f)
    }

    /// Creates a loopback that activates addresses on the given registry.
    pub fn with_registry<A: Application + 'static>(
        application: A,
        registry: Arc<AddressRegistry>,
    ) -> Self {
        Self {
            handler: Arc::new(LoopbackHandler::new(application)),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<AddressRegistry> {
        &self.registry
    }

    pub fn handler(&self) -> &Arc<LoopbackHandler> {
        &self.handler
    }

    /// Appends a handler that sees every request before the application does.
    pub fn register_request_context_handler<H: InterceptHandler + 'static>(&self, handler: H) {
        self.handler.register_request_context_handler(handler);
    }

    /// Starts serving `address`. The `ssl` flag is recorded with the address for the
    /// connection layer; it does not change how requests are translated.
    pub fn activate<A: IntoAddress>(&self, address: A, ssl: bool) -> Result<Address, Error> {
        self.registry.activate(address, &self.handler, ssl)
    }

    /// Stops serving `address`. Fails with [Error::NotRegistered] if this loopback does
    /// not serve it.
    pub fn deactivate<A: IntoAddress>(&self, address: A) -> Result<(), Error> {
        self.registry.deactivate(address, &self.handler)
    }

    /// Stops serving every address. Calling it when nothing is active does nothing.
    pub fn deactivate_all(&self) {
        self.registry.deactivate_all(&self.handler);
    }

    /// Serves `address` until the returned guard goes out of scope.
    ///
    /// **Example**:
    /// ```
    /// use httploopback::{ApplicationResponse, Loopback, PendingRequest};
    ///
    /// let loopback = Loopback::from_fn(|_| Ok(ApplicationResponse::new(200).body("hi")));
    /// {
    ///     let active = loopback.on(("example.com", 80), false).unwrap();
    ///     let res = active
    ///         .handle_request(None, "http://example.com/", PendingRequest::new("GET", "http://example.com/"))
    ///         .unwrap();
    ///     assert_eq!(res.text(), "hi");
    /// }
    /// assert!(loopback.active_addresses().is_empty());
    /// ```
    pub fn on<A: IntoAddress>(&self, address: A, ssl: bool) -> Result<ActivationGuard<'_>, Error> {
        let address = self.activate(address, ssl)?;
        Ok(ActivationGuard {
            loopback: self,
            address,
        })
    }

    /// The addresses this loopback currently serves.
    pub fn active_addresses(&self) -> Vec<Address> {
        self.registry.addresses_of(&self.handler)
    }

    /// Serves one outgoing request with this loopback's application. Cookies the
    /// application sets are also stored in `session`, if given.
    pub fn handle_request(
        &self,
        session: Option<&dyn CookieJar>,
        url: &str,
        request: PendingRequest,
    ) -> Result<TranslatedResponse, Error> {
        self.handler.handle_request(session, url, request)
    }
}

impl Drop for Loopback {
    fn drop(&mut self) {
        self.deactivate_all();
    }
}

/// Keeps an address active. Deactivates it when dropped, unless it was deactivated or
/// taken over in the meantime.
pub struct ActivationGuard<'a> {
    loopback: &'a Loopback,
    address: Address,
}

impl ActivationGuard<'_> {
    pub fn address(&self) -> &Address {
        &self.address
    }
}

impl Deref for ActivationGuard<'_> {
    type Target = Loopback;

    fn deref(&self) -> &Self::Target {
        self.loopback
    }
}

impl Drop for ActivationGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.loopback.deactivate(&self.address) {
            tracing::debug!("Loopback address {} was already released: {}", self.address, err);
        }
    }
}
