//! Response construction for relayed streams.
//!
//! # Design Decisions
//! - Only entity headers describing the relayed bytes are copied; hop-by-hop
//!   and upstream caching/cookie headers stay behind
//! - Content type falls back to the resolver hint, then the configured default
//! - The body is never buffered; see `relay::session`

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};

/// Upstream headers copied verbatim onto the downstream response.
fn forwarded() -> [HeaderName; 6] {
    [
        header::CONTENT_LENGTH,
        header::CONTENT_RANGE,
        header::ACCEPT_RANGES,
        header::CONTENT_ENCODING,
        header::ETAG,
        header::LAST_MODIFIED,
    ]
}

/// Headers of the downstream response for a given upstream response.
pub fn relay_headers(
    upstream: &HeaderMap,
    hint: Option<&'static str>,
    default_content_type: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    let content_type = upstream
        .get(header::CONTENT_TYPE)
        .cloned()
        .or_else(|| hint.map(HeaderValue::from_static))
        .or_else(|| HeaderValue::from_str(default_content_type).ok());
    if let Some(value) = content_type {
        headers.insert(header::CONTENT_TYPE, value);
    }

    for name in forwarded() {
        if let Some(value) = upstream.get(&name) {
            headers.insert(name, value.clone());
        }
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}

/// Build the streamed response; `status` is 200 or 206.
pub fn streamed_response(
    status: StatusCode,
    upstream: &HeaderMap,
    hint: Option<&'static str>,
    default_content_type: &str,
    body: Body,
) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = relay_headers(upstream, hint, default_content_type);
    response
}
