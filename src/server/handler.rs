use crate::{
    api::Application,
    common::{
        data::{ApplicationError, ApplicationResponse, Error, Invocation, PendingRequest},
        util::local_hostname,
    },
    server::{
        cookies::CookieJar,
        intercept::{ChainOutcome, InterceptChain, InterceptHandler},
        request::{parse_target_url, translate_request},
        response::{translate_response, TranslatedResponse},
    },
};
use std::sync::Arc;
use url::Url;

/// Serves loopback requests with one application. A handler can be bound to any number
/// of addresses at the same time.
pub struct LoopbackHandler {
    application: Box<dyn Application>,
    chain: InterceptChain,
}

impl LoopbackHandler {
    pub fn new<A: Application + 'static>(application: A) -> Self {
        Self {
            application: Box::new(application),
            chain: InterceptChain::default(),
        }
    }

    /// Creates a handler from a function that serves invocations.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Invocation) -> Result<ApplicationResponse, ApplicationError> + Send + Sync + 'static,
    {
        Self::new(f)
    }

    /// Appends an intercept handler. Handlers run in registration order for every request.
    pub fn register_request_context_handler<H: InterceptHandler + 'static>(&self, handler: H) {
        self.chain.register(Arc::new(handler));
    }

    pub fn request_context_handler_count(&self) -> usize {
        self.chain.len()
    }

    /// Serves one outgoing request.
    ///
    /// Intercept handlers run first and may answer the request themselves, in which case the
    /// application is never invoked. Scopes the handlers opened are closed after the response
    /// has been built, or when dispatch fails.
    pub fn handle_request(
        &self,
        session: Option<&dyn CookieJar>,
        url: &str,
        mut request: PendingRequest,
    ) -> Result<TranslatedResponse, Error> {
        let target = parse_target_url(url)?;
        tracing::trace!("Dispatching loopback request {} {}", request.method(), url);

        let scopes = match self.chain.enter(&request) {
            ChainOutcome::ShortCircuit(custom) => {
                return Ok(TranslatedResponse::from_custom(custom, request));
            }
            ChainOutcome::Proceed(scopes) => scopes,
        };
        tracing::trace!("{} intercept scope(s) open for {}", scopes.len(), url);

        let invocation = translate_request(&mut request, &target, url, local_hostname())?;
        let result = self.serve(invocation, request, url, &target, session);

        scopes.close();
        result
    }

    fn serve(
        &self,
        invocation: Invocation,
        request: PendingRequest,
        raw_url: &str,
        target: &Url,
        session: Option<&dyn CookieJar>,
    ) -> Result<TranslatedResponse, Error> {
        let response = self
            .application
            .open(invocation)
            .map_err(Error::ApplicationError)?;

        translate_response(response, request, raw_url, target, session)
    }
}
