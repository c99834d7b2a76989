//! Outbound connection to the resolved media URL.

use axum::http::{header, HeaderValue, StatusCode};
use std::time::Duration;

use crate::config::{RelaySettings, TimeoutConfig};
use crate::relay::error::{RelayError, Stage};
use crate::relay::resolver::ResolvedUpstream;

/// Pooled HTTP client for upstream fetches.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    header_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(settings: &RelaySettings, timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect())
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            header_timeout: timeouts.read(),
        })
    }

    /// Send the GET and wait for response headers.
    ///
    /// Only 200 and 206 come back as `Ok`; the body has not been read yet.
    pub async fn open(
        &self,
        upstream: &ResolvedUpstream,
        range: Option<&HeaderValue>,
    ) -> Result<reqwest::Response, RelayError> {
        let mut request = self.client.get(upstream.url.clone());
        if let Some(range) = range {
            request = request.header(header::RANGE, range.clone());
        }

        let response = match tokio::time::timeout(self.header_timeout, request.send()).await {
            Err(_) => return Err(RelayError::Timeout(Stage::Connect)),
            Ok(Err(e)) if e.is_timeout() => return Err(RelayError::Timeout(Stage::Connect)),
            Ok(Err(e)) => {
                tracing::warn!(upstream = %upstream.url, error = %e, "Upstream request failed");
                return Err(RelayError::UpstreamUnavailable("upstream request failed".into()));
            }
            Ok(Ok(response)) => response,
        };

        match response.status() {
            StatusCode::OK | StatusCode::PARTIAL_CONTENT => Ok(response),
            status => {
                tracing::warn!(upstream = %upstream.url, status = %status, "Upstream refused");
                // Dropping the response here discards its body unread.
                Err(RelayError::UpstreamUnavailable(format!(
                    "upstream returned {}",
                    status.as_u16()
                )))
            }
        }
    }
}
