//! Owns the shutdown signal and every background task's `JoinHandle`, so
//! `main` has one place to ask the whole process graph to stop and wait for
//! it.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::shutdown::{Shutdown, ShutdownSignal};

/// How long to wait for background tasks to observe the shutdown signal and
/// return before giving up and exiting anyway.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Tracks the Hub, Matcher, Position Manager, and Broadcast Pipeline tasks
/// spawned by [`crate::app::build`].
#[derive(Debug)]
pub struct Supervisor {
    shutdown: Shutdown,
    handles: Vec<JoinHandle<()>>,
}

impl Supervisor {
    #[must_use]
    pub fn new(shutdown: Shutdown) -> Self {
        Self { shutdown, handles: Vec::new() }
    }

    /// A fresh receiving handle for a background task's `spawn` call.
    #[must_use]
    pub fn signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Track a background task's handle so [`Supervisor::shutdown`] can
    /// join it.
    pub fn track(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    /// Trigger the shutdown signal and wait for every tracked task to
    /// return, up to [`SHUTDOWN_GRACE_PERIOD`]. Tasks still running after
    /// the grace period are left to be reaped by process exit.
    pub async fn shutdown(self) {
        self.shutdown.trigger();

        let join = futures_util::future::join_all(self.handles);
        if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, join).await.is_err() {
            log::warn!("supervisor: background tasks did not stop within the grace period");
        }
    }
}

/// Resolves on Ctrl-C or, on Unix, `SIGTERM` — the two signals a
/// process supervisor (systemd, Docker, Kubernetes) sends for a graceful
/// stop.
pub async fn shutdown_requested() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
