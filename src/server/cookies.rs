use crate::common::{
    data::{ApplicationResponse, PendingRequest},
    util::lock,
};
use cookie::Cookie;
use std::sync::Mutex;
use url::Url;

/// Read access to the headers of a response, in the shape cookie jars expect.
pub trait HeaderLookup {
    /// Returns a single-element list holding the first value of the header, or an empty
    /// list if the header is absent. Names are matched case-insensitively.
    fn get_header(&self, name: &str) -> Vec<String>;

    /// Same as [HeaderLookup::get_header], but returns `default` when the header is absent.
    fn get_all_headers(&self, name: &str, default: Vec<String>) -> Vec<String> {
        let found = self.get_header(name);
        if found.is_empty() {
            return default;
        }
        found
    }
}

/// Presents an [ApplicationResponse] to cookie jars without modifying it.
pub struct CookieResponse<'a> {
    response: &'a ApplicationResponse,
}

impl<'a> CookieResponse<'a> {
    pub fn new(response: &'a ApplicationResponse) -> Self {
        Self { response }
    }
}

impl HeaderLookup for CookieResponse<'_> {
    fn get_header(&self, name: &str) -> Vec<String> {
        match self.response.header_value(name) {
            Some(value) => vec![value.to_string()],
            None => Vec::new(),
        }
    }
}

/// Presents the outgoing request to cookie jars. Cookie defaults (domain and path) are
/// derived from its target URL.
pub struct CookieRequest<'a> {
    request: &'a PendingRequest,
    url: &'a Url,
}

impl<'a> CookieRequest<'a> {
    pub fn new(request: &'a PendingRequest, url: &'a Url) -> Self {
        Self { request, url }
    }

    pub fn request(&self) -> &PendingRequest {
        self.request
    }

    pub fn url(&self) -> &Url {
        self.url
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or("")
    }

    /// The directory of the request path, used as the path of cookies that do not set one.
    pub fn default_path(&self) -> &str {
        let path = self.url.path();
        match path.rfind('/') {
            Some(0) | None => "/",
            Some(idx) => &path[..idx],
        }
    }
}

/// A cookie store that can absorb the cookies an application response sets.
pub trait CookieJar {
    fn extract_cookies(&self, response: &dyn HeaderLookup, request: &CookieRequest<'_>);
}

/// A thread-safe cookie jar kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryCookieJar {
    cookies: Mutex<Vec<Cookie<'static>>>,
}

impl InMemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of the first stored cookie with the given name.
    pub fn get(&self, name: &str) -> Option<String> {
        lock(&self.cookies)
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.value().to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn cookies(&self) -> Vec<Cookie<'static>> {
        lock(&self.cookies).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.cookies).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.cookies).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.cookies).clear();
    }

    /// Renders all stored cookies as a `Cookie` request header value, e.g. `a=1; b=2`.
    pub fn cookie_header(&self) -> Option<String> {
        let cookies = lock(&self.cookies);
        if cookies.is_empty() {
            return None;
        }

        Some(
            cookies
                .iter()
                .map(|c| format!("{}={}", c.name(), c.value()))
                .collect::<Vec<String>>()
                .join("; "),
        )
    }

    pub fn add(&self, mut cookie: Cookie<'static>, request: &CookieRequest<'_>) {
        let domain = match cookie.domain() {
            Some(domain) => domain.trim_start_matches('.').to_ascii_lowercase(),
            None => request.host().to_ascii_lowercase(),
        };
        cookie.set_domain(domain);

        if cookie.path().is_none() {
            cookie.set_path(request.default_path().to_string());
        }

        let expired = cookie
            .max_age()
            .map(|max_age| max_age.is_zero() || max_age.is_negative())
            .unwrap_or(false);

        let mut cookies = lock(&self.cookies);
        cookies.retain(|c| {
            !(c.name() == cookie.name() && c.domain() == cookie.domain() && c.path() == cookie.path())
        });

        if expired {
            tracing::trace!("Removing expired cookie '{}'", cookie.name());
            return;
        }

        tracing::trace!("Storing cookie '{}' for domain {:?}", cookie.name(), cookie.domain());
        cookies.push(cookie);
    }
}

impl CookieJar for InMemoryCookieJar {
    fn extract_cookies(&self, response: &dyn HeaderLookup, request: &CookieRequest<'_>) {
        for header in response.get_all_headers("set-cookie", Vec::new()) {
            match Cookie::parse(header) {
                Ok(cookie) => self.add(cookie.into_owned(), request),
                Err(err) => tracing::debug!("Ignoring unparsable Set-Cookie header: {}", err),
            }
        }
    }
}

#[cfg(feature = "reqwest")]
impl CookieJar for reqwest::cookie::Jar {
    fn extract_cookies(&self, response: &dyn HeaderLookup, request: &CookieRequest<'_>) {
        use reqwest::cookie::CookieStore;

        let values: Vec<http::HeaderValue> = response
            .get_all_headers("set-cookie", Vec::new())
            .iter()
            .filter_map(|value| http::HeaderValue::from_str(value).ok())
            .collect();

        self.set_cookies(&mut values.iter(), request.url());
    }
}
