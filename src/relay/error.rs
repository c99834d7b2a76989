//! Relay error taxonomy and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use thiserror::Error;

/// Suspension point that exceeded its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Connect,
    Read,
    Write,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolve => "resolve",
            Stage::Connect => "connect",
            Stage::Read => "read",
            Stage::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the resolver did not produce a usable URL.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The resolver exited zero but printed nothing.
    #[error("stream not found")]
    NoStream,

    #[error("resolver exited with {status}")]
    Exited { status: String, stderr: String },

    #[error("failed to run resolver: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("resolver returned an invalid URL: {0}")]
    InvalidUrl(String),

    #[error("resolver timed out")]
    TimedOut,
}

/// Errors surfaced to the caller before any body byte is sent.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("resolution failed: {0}")]
    ResolutionFailed(ResolveError),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("{0} timed out")]
    Timeout(Stage),

    #[error("too many active streams")]
    Overloaded,
}

impl From<ResolveError> for RelayError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::TimedOut => RelayError::Timeout(Stage::Resolve),
            other => RelayError::ResolutionFailed(other),
        }
    }
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::ResolutionFailed(ResolveError::NoStream) => StatusCode::NOT_FOUND,
            RelayError::ResolutionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            RelayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short message for the response body. Resolver stderr stays in the logs.
    fn public_message(&self) -> String {
        match self {
            RelayError::ResolutionFailed(ResolveError::Exited { .. })
            | RelayError::ResolutionFailed(ResolveError::Spawn(_)) => {
                "resolution failed: resolver error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), self.public_message()).into_response()
    }
}
