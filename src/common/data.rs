use crate::common::data::Error::{InvalidAddress, InvalidHeader, RequestConversionError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{fmt, fmt::Debug, io::Read, net::SocketAddr};

#[cfg(feature = "cookies")]
use headers::{Cookie, HeaderMapExt};

/// The error type an [Application](crate::Application) reports when it fails to serve a request.
pub type ApplicationError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid address {0}: expected a (host, port) pair")]
    InvalidAddress(String),
    #[error("no loopback target is registered for {0}")]
    NotRegistered(Address),
    #[error("malformed URL: {0}")]
    MalformedUrl(String),
    #[error("cannot read request body: {0}")]
    RequestBodyError(#[source] std::io::Error),
    #[error("cannot decompress gzip response body: {0}")]
    ContentDecodingError(#[source] std::io::Error),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("cannot convert request to/from internal structure: {0}")]
    RequestConversionError(String),
    #[error("application failed to serve the request: {0}")]
    ApplicationError(#[source] ApplicationError),
    #[error("cannot convert JSON: {0}")]
    JSONConversionError(#[from] serde_json::Error),
}

// ===============================================================================================
// Address
// ===============================================================================================

/// A network address of the form `(host, port)` that can be served in-process.
///
/// Host names are stored in lower case, so `("LOCALHOST", 80)` and `("localhost", 80)`
/// identify the same loopback target.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "RawAddress")]
pub struct Address {
    host: String,
    port: u16,
}

#[derive(Deserialize)]
struct RawAddress {
    host: String,
    port: u16,
}

impl TryFrom<RawAddress> for Address {
    type Error = Error;

    fn try_from(raw: RawAddress) -> Result<Self, Self::Error> {
        Address::new(raw.host, raw.port)
    }
}

impl Address {
    pub fn new<H: Into<String>>(host: H, port: u16) -> Result<Self, Error> {
        let host = host.into();
        let trimmed = host.trim();
        let bare = trimmed
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(trimmed);

        if bare.is_empty() || bare.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(InvalidAddress(format!("({:?}, {})", host, port)));
        }

        // Unbracketed colons would make "host:port" ambiguous, unless the host is an IPv6 literal.
        if bare.contains(':') && bare.parse::<std::net::Ipv6Addr>().is_err() {
            return Err(InvalidAddress(format!("({:?}, {})", host, port)));
        }

        Ok(Self {
            host: bare.to_ascii_lowercase(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Conversion into a validated [Address].
///
/// Implemented for `(host, port)` tuples, socket addresses and `"host:port"` strings.
pub trait IntoAddress {
    fn into_address(self) -> Result<Address, Error>;
}

impl IntoAddress for Address {
    fn into_address(self) -> Result<Address, Error> {
        Ok(self)
    }
}

impl IntoAddress for &Address {
    fn into_address(self) -> Result<Address, Error> {
        Ok(self.clone())
    }
}

impl IntoAddress for (&str, u16) {
    fn into_address(self) -> Result<Address, Error> {
        Address::new(self.0, self.1)
    }
}

impl IntoAddress for (String, u16) {
    fn into_address(self) -> Result<Address, Error> {
        Address::new(self.0, self.1)
    }
}

impl IntoAddress for SocketAddr {
    fn into_address(self) -> Result<Address, Error> {
        Address::new(self.ip().to_string(), self.port())
    }
}

impl IntoAddress for &str {
    fn into_address(self) -> Result<Address, Error> {
        let (host, port) = self
            .rsplit_once(':')
            .ok_or_else(|| InvalidAddress(self.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| InvalidAddress(self.to_string()))?;
        Address::new(host, port)
    }
}

impl IntoAddress for String {
    fn into_address(self) -> Result<Address, Error> {
        self.as_str().into_address()
    }
}

// ===============================================================================================
// Pending request
// ===============================================================================================

/// The body of an outgoing request. A stream is read exactly once, when the request is
/// translated into an application invocation.
pub enum RequestBody {
    Empty,
    Bytes(Bytes),
    Stream(Box<dyn Read + Send>),
}

impl Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => write!(f, "Empty"),
            RequestBody::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            RequestBody::Stream(_) => write!(f, "Stream(..)"),
        }
    }
}

/// A read-only view of an outgoing HTTP request as the client library prepared it.
#[derive(Debug)]
pub struct PendingRequest {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: RequestBody,
}

impl PendingRequest {
    pub fn new<M: Into<String>, U: Into<String>>(method: M, url: U) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Appends a header. Repeated names are kept in the order they were added.
    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = RequestBody::Bytes(body.into());
        self
    }

    pub fn body_stream<R: Read + Send + 'static>(mut self, reader: R) -> Self {
        self.body = RequestBody::Stream(Box::new(reader));
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the first value of the header with the given name (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn request_body(&self) -> &RequestBody {
        &self.body
    }

    pub fn request_body_mut(&mut self) -> &mut RequestBody {
        &mut self.body
    }

    /// Materializes the body. Streams are drained and left consumed.
    pub(crate) fn read_body(&mut self) -> Result<Bytes, Error> {
        match &mut self.body {
            RequestBody::Empty => Ok(Bytes::new()),
            RequestBody::Bytes(bytes) => Ok(bytes.clone()),
            RequestBody::Stream(reader) => {
                let mut buf = Vec::new();
                reader
                    .read_to_end(&mut buf)
                    .map_err(Error::RequestBodyError)?;
                Ok(Bytes::from(buf))
            }
        }
    }

    /// Parses the `Cookie` header of this request into name/value pairs.
    #[cfg(feature = "cookies")]
    pub fn cookies(&self) -> Vec<(String, String)> {
        let mut header_map = http::HeaderMap::new();
        for (name, value) in &self.headers {
            let name = http::HeaderName::from_bytes(name.as_bytes());
            let value = http::HeaderValue::from_str(value);
            if let (Ok(name), Ok(value)) = (name, value) {
                header_map.append(name, value);
            }
        }

        let mut result = Vec::new();
        if let Some(cookie) = header_map.typed_get::<Cookie>() {
            for (key, value) in cookie.iter() {
                result.push((key.to_string(), value.to_string()));
            }
        }

        result
    }
}

// ===============================================================================================
// Invocation
// ===============================================================================================

/// The synthetic client address an application sees for a loopback request.
/// Added as an extension to requests built by [Invocation::to_http_request].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddr(pub String);

/// Everything an application needs to serve one loopback request. Owns all of its data.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub path: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub base_url: String,
    pub remote_addr: String,
}

impl Invocation {
    /// The absolute URL of this request, i.e. `base_url` followed by `path`.
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn to_http_request(&self) -> Result<http::Request<Bytes>, Error> {
        let method = http::Method::from_bytes(self.method.as_bytes())
            .map_err(|err| RequestConversionError(err.to_string()))?;

        let mut builder = http::Request::builder().method(method).uri(self.url());
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut req = builder
            .body(self.body.clone())
            .map_err(|err| RequestConversionError(err.to_string()))?;
        req.extensions_mut()
            .insert(RemoteAddr(self.remote_addr.clone()));

        Ok(req)
    }
}

// ===============================================================================================
// Application response
// ===============================================================================================

/// The response an application produced for an [Invocation].
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationResponse {
    status_code: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl ApplicationResponse {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a response with a JSON body and a matching `content-type` header.
    pub fn json<T: Serialize>(status_code: u16, body: &T) -> Result<Self, Error> {
        let body = serde_json::to_vec(body)?;
        Ok(Self::new(status_code)
            .header("content-type", "application/json")
            .body(body))
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the first value of the header with the given name (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_bytes(&self) -> Bytes {
        self.body.clone()
    }

    pub(crate) fn header_map(&self) -> Result<http::HeaderMap, Error> {
        let mut header_map = http::HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name = http::HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| InvalidHeader(format!("{}: {}", name, err)))?;
            let header_value = http::HeaderValue::from_str(value)
                .map_err(|err| InvalidHeader(format!("{}: {}", name, err)))?;
            header_map.append(header_name, header_value);
        }
        Ok(header_map)
    }
}

impl TryFrom<http::Response<Bytes>> for ApplicationResponse {
    type Error = Error;

    fn try_from(value: http::Response<Bytes>) -> Result<Self, Self::Error> {
        let (parts, body) = value.into_parts();

        let mut headers = Vec::with_capacity(parts.headers.len());
        for (key, value) in &parts.headers {
            let value = value
                .to_str()
                .map_err(|err| InvalidHeader(format!("{}: {}", key, err)))?;
            headers.push((key.as_str().to_string(), value.to_string()))
        }

        Ok(Self {
            status_code: parts.status.as_u16(),
            headers,
            body,
        })
    }
}
