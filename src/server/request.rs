use crate::common::data::{Error, Error::MalformedUrl, Invocation, PendingRequest};
use url::{Position, Url};

/// Parses the target URL of an outgoing request. The URL must carry a scheme.
pub(crate) fn parse_target_url(url: &str) -> Result<Url, Error> {
    let parsed = Url::parse(url).map_err(|err| MalformedUrl(format!("{}: {}", url, err)))?;
    if parsed.scheme().is_empty() {
        return Err(MalformedUrl(format!("{}: missing scheme", url)));
    }
    Ok(parsed)
}

/// Derives the application-relative path (including the query) from the URL string
/// exactly as the client passed it: everything after the third `/`-delimited segment.
pub(crate) fn application_path(url: &str) -> String {
    match url.splitn(4, '/').nth(3) {
        Some(rest) => format!("/{}", rest),
        None => "/".to_string(),
    }
}

/// Returns `scheme://network-location` of the URL, including credentials and port.
pub(crate) fn base_url(url: &Url) -> String {
    url[..Position::BeforePath].to_string()
}

/// Turns an outgoing request into an application invocation. A streamed request body is
/// read to its end.
pub(crate) fn translate_request(
    request: &mut PendingRequest,
    url: &Url,
    raw_url: &str,
    remote_addr: &str,
) -> Result<Invocation, Error> {
    let body = request.read_body()?;

    let invocation = Invocation {
        path: application_path(raw_url),
        method: request.method().to_uppercase(),
        headers: request.headers().to_vec(),
        body,
        base_url: base_url(url),
        remote_addr: remote_addr.to_string(),
    };

    tracing::trace!(
        "Translated {} {} into application call {} {} (base URL {})",
        request.method(),
        raw_url,
        invocation.method,
        invocation.path,
        invocation.base_url
    );

    Ok(invocation)
}
