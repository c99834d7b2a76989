//! Stream relay subsystem.
//!
//! # Data Flow
//! ```text
//! Target (validated page URL)
//!     → session permit (bounded concurrency)
//!     → resolver.rs (external process, deadline, kill on drop)
//!     → upstream.rs (GET with Range, connect/header timeouts, 200/206 only)
//!     → session.rs (one-chunk pump, cancellation, read/write timeouts)
//!     → streamed response
//! ```
//!
//! # Design Decisions
//! - Every failure before the first body byte becomes a [`RelayError`]
//! - Failures after that truncate the body; the status is already sent
//! - No state is shared between requests except the client pool, permits
//!   and the stop flag that ends live sessions on shutdown

pub mod error;
pub mod resolver;
pub mod session;
pub mod upstream;

use axum::http::HeaderValue;
use axum::response::Response;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::config::{RelayConfig, RelaySettings};
use crate::http::response::streamed_response;

pub use error::{RelayError, ResolveError, Stage};
pub use resolver::{ResolvedUpstream, Resolver};
pub use session::{RelaySession, SessionLimits, SessionOutcome};
pub use upstream::UpstreamClient;

/// A validated target identifier (video page URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target(Url);

impl Target {
    /// Accept a non-empty absolute http(s) URL of at most `max_len` bytes.
    pub fn parse(raw: &str, max_len: usize) -> Result<Self, RelayError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RelayError::InvalidRequest("url must not be empty".into()));
        }
        if raw.len() > max_len {
            return Err(RelayError::InvalidRequest(format!(
                "url longer than {max_len} bytes"
            )));
        }
        let url = Url::parse(raw)
            .map_err(|e| RelayError::InvalidRequest(format!("malformed url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
            return Err(RelayError::InvalidRequest(
                "url must be an absolute http(s) URL".into(),
            ));
        }
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Resolves targets and relays their media streams.
#[derive(Debug, Clone)]
pub struct Relay {
    resolver: Resolver,
    upstream: UpstreamClient,
    sessions: Arc<Semaphore>,
    settings: RelaySettings,
    limits: SessionLimits,
    stop: Arc<watch::Sender<bool>>,
}

impl Relay {
    pub fn new(config: &RelayConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            resolver: Resolver::new(config.resolver.clone(), config.timeouts.resolve()),
            upstream: UpstreamClient::new(&config.relay, &config.timeouts)?,
            sessions: Arc::new(Semaphore::new(config.listener.max_sessions)),
            settings: config.relay.clone(),
            limits: SessionLimits {
                chunk_size: config.relay.chunk_size,
                read_timeout: config.timeouts.read(),
                write_timeout: config.timeouts.write(),
            },
            stop: Arc::new(watch::channel(false).0),
        })
    }

    /// Parse a raw identifier with the configured length bound.
    pub fn target(&self, raw: &str) -> Result<Target, RelayError> {
        Target::parse(raw, self.settings.max_target_len)
    }

    /// Free session slots.
    pub fn available_sessions(&self) -> usize {
        self.sessions.available_permits()
    }

    /// End every live session and any started later. Their bodies are truncated.
    pub fn stop_sessions(&self) {
        self.stop.send_replace(true);
        tracing::info!(
            sessions = self.stop.receiver_count(),
            "Stopping live relay sessions"
        );
    }

    fn acquire(&self) -> Result<OwnedSemaphorePermit, RelayError> {
        let permit = self.sessions.clone().try_acquire_owned();
        permit.map_err(|_| RelayError::Overloaded)
    }

    /// Resolve only, for callers that hand the URL out instead of relaying it.
    pub async fn resolve(&self, target: &Target) -> Result<ResolvedUpstream, RelayError> {
        let _permit = self.acquire()?;
        Ok(self.resolver.resolve(target).await?)
    }

    /// Resolve `target`, open the upstream and start streaming it.
    pub async fn handle(
        &self,
        target: &Target,
        range: Option<&HeaderValue>,
        request_id: &str,
    ) -> Result<Response, RelayError> {
        let permit = self.acquire()?;
        tracing::debug!(
            request_id = %request_id,
            sessions_available = self.available_sessions(),
            "Session admitted"
        );

        let resolved = self.resolver.resolve(target).await?;
        tracing::debug!(
            request_id = %request_id,
            upstream = %resolved.url,
            "Resolved target"
        );

        let response = self.upstream.open(&resolved, range).await?;
        let status = response.status();
        let headers = response.headers().clone();

        let (body, _session) = RelaySession::new(response.bytes_stream(), self.limits, request_id)
            .with_permit(permit)
            .with_stop(self.stop.subscribe())
            .start();

        Ok(streamed_response(
            status,
            &headers,
            resolved.content_type,
            &self.settings.default_content_type,
            body,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_validation() {
        assert!(Target::parse("https://example.com/watch?v=abc", 64).is_ok());
        assert!(Target::parse("  http://example.com/x  ", 64).is_ok());

        for bad in ["", "   ", "not a url", "ftp://example.com/x", "file:///etc/passwd", "https://"] {
            let err = Target::parse(bad, 64).unwrap_err();
            assert!(matches!(err, RelayError::InvalidRequest(_)), "{bad}");
        }

        let long = format!("https://example.com/{}", "a".repeat(64));
        assert!(Target::parse(&long, 64).is_err());
    }

    #[tokio::test]
    async fn exhausted_sessions_are_overloaded() {
        let mut config = RelayConfig::default();
        config.listener.max_sessions = 1;
        let relay = Relay::new(&config).unwrap();

        let held = relay.acquire().unwrap();
        assert_eq!(relay.available_sessions(), 0);
        assert!(matches!(relay.acquire(), Err(RelayError::Overloaded)));

        drop(held);
        assert_eq!(relay.available_sessions(), 1);
    }

    #[test]
    fn stop_flag_is_seen_by_later_sessions() {
        let relay = Relay::new(&RelayConfig::default()).unwrap();
        let early = relay.stop.subscribe();
        relay.stop_sessions();

        assert!(*early.borrow());
        assert!(*relay.stop.subscribe().borrow());
    }
}
