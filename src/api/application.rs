use crate::common::{
    data::{ApplicationError, ApplicationResponse, Invocation},
    runtime,
};
use async_trait::async_trait;
use bytes::Bytes;

/// The in-process web application that serves loopback requests.
///
/// Any `Fn(Invocation) -> Result<ApplicationResponse, ApplicationError>` is an application.
pub trait Application: Send + Sync {
    fn open(&self, invocation: Invocation) -> Result<ApplicationResponse, ApplicationError>;
}

impl<F> Application for F
where
    F: Fn(Invocation) -> Result<ApplicationResponse, ApplicationError> + Send + Sync,
{
    fn open(&self, invocation: Invocation) -> Result<ApplicationResponse, ApplicationError> {
        (self)(invocation)
    }
}

/// An application written against the `http` crate types.
#[async_trait]
pub trait HttpApplication: Send + Sync {
    async fn handle(
        &self,
        req: http::Request<Bytes>,
    ) -> Result<http::Response<Bytes>, ApplicationError>;
}

/// Serves loopback requests with an [HttpApplication].
///
/// Every invocation is driven to completion on its own current-thread runtime, so
/// dispatching must not happen from inside another tokio runtime.
pub struct ServiceApplication<H> {
    inner: H,
}

impl<H: HttpApplication> ServiceApplication<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H: HttpApplication> Application for ServiceApplication<H> {
    fn open(&self, invocation: Invocation) -> Result<ApplicationResponse, ApplicationError> {
        let req = invocation.to_http_request()?;
        let res = runtime::block_on_current_thread(self.inner.handle(req))??;
        Ok(ApplicationResponse::try_from(res)?)
    }
}
