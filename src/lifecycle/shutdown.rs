//! Shutdown coordination.

use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Long-running tasks subscribe to a broadcast channel. [`Shutdown::drain`]
/// fires it and bounds how long the caller waits for them. Dropping the
/// coordinator also wakes every subscriber.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    deadline: Duration,
}

impl Shutdown {
    pub fn new(deadline: Duration) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx, deadline }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Trigger, then wait for `task` until the drain deadline passes.
    ///
    /// Returns `None` if the deadline passed first.
    pub async fn drain<F: Future>(&self, task: F) -> Option<F::Output> {
        self.trigger();
        match tokio::time::timeout(self.deadline, task).await {
            Ok(output) => Some(output),
            Err(_) => {
                tracing::warn!(
                    deadline_ms = self.deadline.as_millis() as u64,
                    "Drain deadline passed, exiting with work in flight"
                );
                None
            }
        }
    }
}
