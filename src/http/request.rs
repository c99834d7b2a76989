//! Request identification and query extraction.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) unless the caller supplied one
//! - Read the request ID back inside handlers for log correlation
//! - Extract the relay query and sanitize path video ids

use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use serde::Deserialize;
use tower_http::request_id::{MakeRequestId, RequestId};

/// Header carrying the request ID in both directions.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates UUID v4 request IDs for [`tower_http::request_id::SetRequestIdLayer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRelayRequestId;

impl MakeRequestId for MakeRelayRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Request ID set by the middleware, or `"unknown"` outside of it.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Query string of the relay routes.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub url: Option<String>,
}

/// Keep only `[A-Za-z0-9_-]` from a path video id.
pub fn sanitize_video_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .collect()
}
