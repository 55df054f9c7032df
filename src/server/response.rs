use crate::{
    common::{
        data::{ApplicationResponse, Error, Error::ContentDecodingError, PendingRequest},
        util::reason_phrase,
    },
    server::{
        cookies::{CookieJar, CookieRequest, CookieResponse, InMemoryCookieJar},
        intercept::CustomResponse,
    },
};
use bytes::Bytes;
use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use std::{
    borrow::Cow,
    io,
    io::{Cursor, Read},
};
use url::Url;

/// A body reader that behaves like the stream of a real socket response.
///
/// Reading after [BodyReader::close] yields zero bytes instead of failing, and a read that
/// yields zero bytes marks the reader as closed. Consumers that look at either signal see
/// the same thing they would see on a live connection.
#[derive(Debug)]
pub struct BodyReader {
    inner: Cursor<Bytes>,
    closed: bool,
}

impl BodyReader {
    pub fn new(body: Bytes) -> Self {
        Self {
            inner: Cursor::new(body),
            closed: false,
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed || buf.is_empty() {
            return Ok(0);
        }

        let n = self.inner.read(buf)?;
        if n == 0 {
            self.close();
        }

        Ok(n)
    }
}

/// The low-level view of a translated response, as a client's transport would see it.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub reason: Option<&'static str>,
    pub headers: http::HeaderMap,
    pub body: BodyReader,
}

impl Read for RawResponse {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

/// The response handed back to the client for one loopback request.
#[derive(Debug)]
pub struct TranslatedResponse {
    pub url: String,
    pub status_code: u16,
    pub reason: Option<&'static str>,
    pub headers: http::HeaderMap,
    pub content: Bytes,
    pub request: PendingRequest,
    pub raw: RawResponse,
    pub cookies: InMemoryCookieJar,
}

impl TranslatedResponse {
    /// Builds the response for a request an intercept handler answered itself.
    pub(crate) fn from_custom(custom: CustomResponse, request: PendingRequest) -> Self {
        let status_code = custom.status_code();
        let reason = custom.reason();

        Self {
            url: request.url().to_string(),
            status_code,
            reason,
            headers: http::HeaderMap::new(),
            content: Bytes::new(),
            request,
            raw: RawResponse {
                status: status_code,
                reason,
                headers: http::HeaderMap::new(),
                body: BodyReader::new(Bytes::new()),
            },
            cookies: InMemoryCookieJar::new(),
        }
    }

    pub fn status(&self) -> Option<http::StatusCode> {
        http::StatusCode::from_u16(self.status_code).ok()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Returns the first value of a header, if it is present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(&self.content)?)
    }
}

fn is_gzip_encoded(response: &ApplicationResponse) -> bool {
    response
        .header_value("content-encoding")
        .map(|v| v.trim().eq_ignore_ascii_case("gzip"))
        .unwrap_or(false)
}

fn gzip_decompress(body: &[u8]) -> Result<Bytes, Error> {
    let mut decoded = Vec::new();
    GzDecoder::new(body)
        .read_to_end(&mut decoded)
        .map_err(ContentDecodingError)?;
    Ok(Bytes::from(decoded))
}

/// Turns an application response into the response the client receives. Cookies the
/// application sets are stored in the response's own jar and, if given, in `session`.
///
/// `raw_url` is reported back unchanged; `url` only supplies cookie defaults.
pub(crate) fn translate_response(
    response: ApplicationResponse,
    request: PendingRequest,
    raw_url: &str,
    url: &Url,
    session: Option<&dyn CookieJar>,
) -> Result<TranslatedResponse, Error> {
    let status_code = response.status_code();
    let reason = reason_phrase(status_code);

    let mut content = response.body_bytes();
    if is_gzip_encoded(&response) {
        content = gzip_decompress(&content)?;
    }

    let headers = response.header_map()?;

    let cookies = InMemoryCookieJar::new();
    {
        let mock_response = CookieResponse::new(&response);
        let mock_request = CookieRequest::new(&request, url);
        cookies.extract_cookies(&mock_response, &mock_request);
        if let Some(session) = session {
            session.extract_cookies(&mock_response, &mock_request);
        }
    }

    tracing::trace!(
        "Application answered {} with status {} and {} body bytes",
        raw_url,
        status_code,
        content.len()
    );

    Ok(TranslatedResponse {
        url: raw_url.to_string(),
        status_code,
        reason,
        raw: RawResponse {
            status: status_code,
            reason,
            headers: headers.clone(),
            body: BodyReader::new(content.clone()),
        },
        headers,
        content,
        request,
        cookies,
    })
}
