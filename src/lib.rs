//! `httploopback` lets your tests send what looks like a real HTTP request to a `(host, port)`
//! and have it served in-process by a local application, without opening a socket.
//!
//! It contains three major components:
//!
//! * an **address registry** that knows which addresses are served in-process and by whom,
//! * a **loopback handler** that translates an outgoing request into an application call and
//!   the application's answer back into a response a client understands (status line, headers,
//!   cookies, content encoding and a body stream that behaves like a socket), and
//! * **intercept handlers** that see every request first and may answer it themselves.
//!
//! # Getting Started
//! ```rust
//! use httploopback::{ApplicationResponse, InMemoryCookieJar, Loopback, PendingRequest};
//!
//! // The application under test. Any function from `Invocation` to `ApplicationResponse` will do.
//! let loopback = Loopback::from_fn(|inv| {
//!     Ok(ApplicationResponse::new(200)
//!         .header("Set-Cookie", "session=abc")
//!         .body(format!("{} {}", inv.method, inv.path)))
//! });
//!
//! let session = InMemoryCookieJar::new();
//! let active = loopback.on(("api.example.com", 443), true).unwrap();
//!
//! let res = active
//!     .registry()
//!     .dispatch(
//!         ("api.example.com", 443),
//!         Some(&session),
//!         "https://api.example.com/v1/users?page=2",
//!         PendingRequest::new("get", "https://api.example.com/v1/users?page=2"),
//!     )
//!     .unwrap();
//!
//! assert_eq!(res.status_code, 200);
//! assert_eq!(res.reason, Some("OK"));
//! assert_eq!(res.text(), "GET /v1/users?page=2");
//! assert_eq!(session.get("session"), Some("abc".to_string()));
//! ```
//!
//! # Intercepting requests
//! Intercept handlers run in registration order before the application. Each one either lets
//! the request through (optionally keeping a scope open until the response is built) or answers
//! it with a status code of its own, in which case the application is never called:
//! ```rust
//! use httploopback::{ApplicationResponse, Intercept, Loopback, PendingRequest};
//!
//! let loopback = Loopback::from_fn(|_| Ok(ApplicationResponse::new(200)));
//! loopback.register_request_context_handler(|req: &PendingRequest| {
//!     match req.header_value("Authorization") {
//!         Some(_) => Intercept::proceed(),
//!         None => Intercept::respond(401),
//!     }
//! });
//!
//! let res = loopback
//!     .handle_request(None, "http://localhost/", PendingRequest::new("GET", "http://localhost/"))
//!     .unwrap();
//! assert_eq!(res.status_code, 401);
//! assert_eq!(res.reason, Some("Unauthorized"));
//! ```
//!
//! # Applications built on `http`
//! Applications that already speak `http::Request`/`http::Response` implement
//! [HttpApplication] and are wrapped in a [ServiceApplication].
//!
//! # Debugging
//! `httploopback` logs through the `tracing` crate, which forwards to the `log` crate when no
//! subscriber is installed. With the `env_logger` backend, set `RUST_LOG=httploopback=trace`
//! and call `env_logger::try_init()` in your test.
//!
//! # Configuration
//! The synthetic remote address applications see is the local host name. Set the environment
//! variable `LOOPBACK_HOSTNAME` to override it.

#[macro_use]
extern crate lazy_static;

mod api;
mod common;
mod server;

pub use api::{ActivationGuard, Application, HttpApplication, Loopback, ServiceApplication};
pub use common::{
    data::{
        Address, ApplicationError, ApplicationResponse, Error, IntoAddress, Invocation,
        PendingRequest, RemoteAddr, RequestBody,
    },
    util::{local_hostname, reason_phrase},
};
pub use server::{
    cookies::{CookieJar, CookieRequest, CookieResponse, HeaderLookup, InMemoryCookieJar},
    handler::LoopbackHandler,
    intercept::{CustomResponse, Intercept, InterceptHandler, InterceptScope},
    registry::{AddressRegistry, LoopbackTarget},
    response::{BodyReader, RawResponse, TranslatedResponse},
};

pub mod prelude {
    #[doc(no_inline)]
    pub use crate::{
        ApplicationResponse, CookieJar, InMemoryCookieJar, Intercept, Invocation, Loopback,
        PendingRequest, TranslatedResponse,
    };
}
