//! Cooperative shutdown signal shared by every background task.
//!
//! A `watch<bool>` rather than a `CancellationToken`: `tokio::sync::watch`
//! is already a direct dependency and needs nothing beyond what it already
//! provides — broadcasting one terminal value to an arbitrary number of
//! cloned receivers.

use tokio::sync::watch;

/// Held by the process supervisor. Dropping it (or calling
/// [`Shutdown::trigger`]) tells every [`ShutdownSignal`] to stop.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

/// Cloned into each background task's `spawn` call.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Build a fresh, untriggered shutdown signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// A receiving handle for a new background task.
    #[must_use]
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal { rx: self.tx.subscribe() }
    }

    /// Tell every outstanding [`ShutdownSignal`] to stop.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Resolves once [`Shutdown::trigger`] has been called. Cancel-safe:
    /// fine to use as one arm of a `tokio::select!` inside a loop.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_wakes_every_outstanding_signal() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.signal();
        let mut b = shutdown.signal();

        shutdown.trigger();
        a.wait().await;
        b.wait().await;
    }
}
