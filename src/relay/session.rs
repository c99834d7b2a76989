//! Relay session: moves bytes from one upstream body to one downstream body.
//!
//! # Design
//! ```text
//! upstream stream ──pump task──▶ mpsc(1) ──▶ Body::from_stream ──▶ hyper
//! ```
//! The pump reserves the channel slot *before* reading upstream, so the next
//! upstream chunk is only pulled after the downstream body has taken the
//! previous one. The receiver lives inside the response body; when hyper
//! drops the body (client gone) the channel closes and the pending upstream
//! read is abandoned at once, which drops the upstream connection.
//! The relay's stop flag ends the session the same way, so graceful
//! shutdown is not held open by live streams.

use axum::body::{Body, Bytes};
use futures_util::{Stream, StreamExt};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit};

use crate::observability::metrics;
use crate::relay::error::Stage;

type Chunk = Result<Bytes, io::Error>;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Upstream reached end of stream and everything was handed downstream.
    Complete,
    /// The downstream client went away.
    ClientDisconnected,
    /// Upstream failed mid-stream.
    UpstreamFailed,
    /// A read or write stage exceeded its bound.
    TimedOut(Stage),
    /// The relay is shutting down.
    Stopped,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Complete => "complete",
            SessionOutcome::ClientDisconnected => "client_disconnected",
            SessionOutcome::UpstreamFailed => "upstream_failed",
            SessionOutcome::TimedOut(Stage::Write) => "write_timeout",
            SessionOutcome::TimedOut(_) => "read_timeout",
            SessionOutcome::Stopped => "stopped",
        }
    }
}

/// Chunking and timeout limits for one session.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub chunk_size: usize,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

/// A live pairing of an upstream byte stream and a downstream body.
pub struct RelaySession<S> {
    upstream: S,
    limits: SessionLimits,
    request_id: String,
    _permit: Option<OwnedSemaphorePermit>,
    stop: Option<watch::Receiver<bool>>,
}

impl<S, E> RelaySession<S>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new(upstream: S, limits: SessionLimits, request_id: impl Into<String>) -> Self {
        Self {
            upstream,
            limits,
            request_id: request_id.into(),
            _permit: None,
            stop: None,
        }
    }

    /// Hold a session permit until the pump finishes.
    pub fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self._permit = Some(permit);
        self
    }

    /// End the session once `stop` turns true or its sender is dropped.
    pub fn with_stop(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Spawn the pump and return the downstream body.
    ///
    /// The join handle resolves to the session outcome once the pump stops.
    /// The body ends cleanly only if the session completed; otherwise its
    /// last item is an error, so a cut-off stream never looks whole.
    pub fn start(self) -> (Body, tokio::task::JoinHandle<SessionOutcome>) {
        let (tx, rx) = mpsc::channel::<Chunk>(1);
        let complete = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(self.pump(tx, complete.clone()));
        let body = futures_util::stream::unfold(Some(rx), move |rx| {
            let complete = complete.clone();
            async move {
                let mut rx = rx?;
                match rx.recv().await {
                    Some(chunk) => Some((chunk, Some(rx))),
                    None if complete.load(Ordering::Acquire) => None,
                    None => Some((Err(io::Error::other("relay session ended early")), None)),
                }
            }
        });
        (Body::from_stream(body), handle)
    }

    async fn pump(mut self, tx: mpsc::Sender<Chunk>, complete: Arc<AtomicBool>) -> SessionOutcome {
        metrics::session_started();
        let mut stop = self.stop.take();
        let mut upstream = Box::pin(self.upstream);
        let mut pending = Bytes::new();
        let mut relayed: u64 = 0;

        let outcome = loop {
            let reserved = tokio::select! {
                _ = stopped(&mut stop) => break SessionOutcome::Stopped,
                reserved = tokio::time::timeout(self.limits.write_timeout, tx.reserve()) => reserved,
            };
            let slot = match reserved {
                Ok(Ok(slot)) => slot,
                Ok(Err(_)) => break SessionOutcome::ClientDisconnected,
                Err(_) => break SessionOutcome::TimedOut(Stage::Write),
            };

            if pending.is_empty() {
                let next = tokio::select! {
                    _ = tx.closed() => break SessionOutcome::ClientDisconnected,
                    _ = stopped(&mut stop) => break SessionOutcome::Stopped,
                    next = tokio::time::timeout(self.limits.read_timeout, upstream.next()) => next,
                };
                match next {
                    Ok(Some(Ok(bytes))) => pending = bytes,
                    Ok(None) => break SessionOutcome::Complete,
                    Ok(Some(Err(e))) => {
                        tracing::warn!(request_id = %self.request_id, error = %e, bytes = relayed, "Upstream failed mid-stream");
                        slot.send(Err(io::Error::other(e)));
                        break SessionOutcome::UpstreamFailed;
                    }
                    Err(_) => {
                        slot.send(Err(io::Error::new(io::ErrorKind::TimedOut, "upstream read timed out")));
                        break SessionOutcome::TimedOut(Stage::Read);
                    }
                }
                if pending.is_empty() {
                    continue;
                }
            }

            let chunk = if pending.len() > self.limits.chunk_size {
                pending.split_to(self.limits.chunk_size)
            } else {
                std::mem::take(&mut pending)
            };
            relayed += chunk.len() as u64;
            slot.send(Ok(chunk));
        };

        if outcome == SessionOutcome::Complete {
            complete.store(true, Ordering::Release);
        }
        metrics::session_finished(outcome.as_str(), relayed);
        match outcome {
            SessionOutcome::Complete => {
                tracing::debug!(request_id = %self.request_id, bytes = relayed, "Relay complete")
            }
            SessionOutcome::ClientDisconnected => {
                tracing::debug!(request_id = %self.request_id, bytes = relayed, "Client disconnected")
            }
            SessionOutcome::Stopped => {
                tracing::info!(request_id = %self.request_id, bytes = relayed, "Relay stopped for shutdown")
            }
            other => {
                tracing::warn!(request_id = %self.request_id, bytes = relayed, outcome = other.as_str(), "Relay aborted")
            }
        }
        outcome
    }
}

async fn stopped(stop: &mut Option<watch::Receiver<bool>>) {
    match stop {
        Some(rx) => {
            let _ = rx.wait_for(|stop| *stop).await;
        }
        None => std::future::pending().await,
    }
}
