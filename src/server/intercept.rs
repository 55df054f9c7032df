use crate::common::{data::PendingRequest, util::lock, util::reason_phrase};
use std::sync::{Arc, Mutex};

/// A ready-made response an intercept handler returns instead of letting the
/// application serve the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomResponse {
    status_code: u16,
}

impl CustomResponse {
    pub fn new(status_code: u16) -> Self {
        Self { status_code }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn reason(&self) -> Option<&'static str> {
        reason_phrase(self.status_code)
    }
}

/// A resource an intercept handler holds for the duration of one dispatch.
/// `exit` is called exactly once, after the response was built or dispatch failed.
pub trait InterceptScope {
    fn exit(self: Box<Self>);
}

impl<F: FnOnce()> InterceptScope for F {
    fn exit(self: Box<Self>) {
        (*self)()
    }
}

/// What an intercept handler decided about a pending request.
pub enum Intercept {
    /// Continue dispatching, optionally keeping a scope open until dispatch finishes.
    Proceed(Option<Box<dyn InterceptScope>>),
    /// Stop dispatching and answer with the given response. The application is not invoked.
    ShortCircuit(CustomResponse),
}

impl Intercept {
    pub fn proceed() -> Self {
        Intercept::Proceed(None)
    }

    pub fn scoped<S: InterceptScope + 'static>(scope: S) -> Self {
        Intercept::Proceed(Some(Box::new(scope)))
    }

    pub fn respond(status_code: u16) -> Self {
        Intercept::ShortCircuit(CustomResponse::new(status_code))
    }
}

/// A hook that sees every request a handler serves before the application does.
pub trait InterceptHandler: Send + Sync {
    fn enter(&self, request: &PendingRequest) -> Intercept;
}

impl<F> InterceptHandler for F
where
    F: Fn(&PendingRequest) -> Intercept + Send + Sync,
{
    fn enter(&self, request: &PendingRequest) -> Intercept {
        (self)(request)
    }
}

/// Scopes entered during one dispatch. Dropping the stack exits all remaining scopes
/// in reverse order, which also covers early returns and panics.
pub(crate) struct ScopeStack {
    scopes: Vec<Box<dyn InterceptScope>>,
}

impl ScopeStack {
    fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    fn push(&mut self, scope: Box<dyn InterceptScope>) {
        self.scopes.push(scope);
    }

    pub(crate) fn len(&self) -> usize {
        self.scopes.len()
    }

    pub(crate) fn close(mut self) {
        self.exit_all();
    }

    fn exit_all(&mut self) {
        while let Some(scope) = self.scopes.pop() {
            scope.exit();
        }
    }
}

impl Drop for ScopeStack {
    fn drop(&mut self) {
        self.exit_all();
    }
}

pub(crate) enum ChainOutcome {
    Proceed(ScopeStack),
    ShortCircuit(CustomResponse),
}

/// The ordered intercept handlers of one loopback handler.
#[derive(Default)]
pub(crate) struct InterceptChain {
    handlers: Mutex<Vec<Arc<dyn InterceptHandler>>>,
}

impl InterceptChain {
    pub(crate) fn register(&self, handler: Arc<dyn InterceptHandler>) {
        lock(&self.handlers).push(handler);
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.handlers).len()
    }

    /// Enters every handler in registration order. The first short-circuit wins; scopes
    /// entered before it are exited in reverse order before this function returns.
    pub(crate) fn enter(&self, request: &PendingRequest) -> ChainOutcome {
        // Handlers may register further handlers, so do not hold the lock while calling them.
        let handlers = lock(&self.handlers).clone();
        let mut stack = ScopeStack::new();

        for (idx, handler) in handlers.iter().enumerate() {
            match handler.enter(request) {
                Intercept::Proceed(Some(scope)) => stack.push(scope),
                Intercept::Proceed(None) => {}
                Intercept::ShortCircuit(response) => {
                    tracing::debug!(
                        "Intercept handler #{} answered {} {} with status {}",
                        idx,
                        request.method(),
                        request.url(),
                        response.status_code()
                    );
                    stack.close();
                    return ChainOutcome::ShortCircuit(response);
                }
            }
        }

        ChainOutcome::Proceed(stack)
    }
}
