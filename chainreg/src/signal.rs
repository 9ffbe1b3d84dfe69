//! Graceful shutdown for `chainreg serve`.
//!
//! [`Shutdown`] cancels a shared [`CancellationToken`] on SIGTERM / SIGINT
//! (Ctrl+C on Windows) and tracks background tasks so the server can wait
//! for them before exiting.

use std::future::Future;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Shutdown coordinator shared by the HTTP server and its background tasks.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    tracker: TaskTracker,
    token: CancellationToken,
}

impl Shutdown {
    /// Coordinator that is only cancelled through [`Self::trigger`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Coordinator that is also cancelled by OS shutdown signals.
    ///
    /// # Errors
    ///
    /// Returns an [`std::io::Error`] if signal registration fails.
    #[allow(clippy::unnecessary_wraps)]
    pub fn with_signals() -> Result<Self, std::io::Error> {
        let shutdown = Self::new();
        let token = shutdown.token.clone();

        #[cfg(unix)]
        {
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;
            shutdown.tracker.spawn(async move {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("SIGTERM received, shutting down"),
                    _ = sigint.recv() => tracing::info!("SIGINT received, shutting down"),
                    () = token.cancelled() => return,
                }
                token.cancel();
            });
        }

        #[cfg(windows)]
        {
            shutdown.tracker.spawn(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("Ctrl+C received, shutting down"),
                    () = token.cancelled() => return,
                }
                token.cancel();
            });
        }

        Ok(shutdown)
    }

    /// Token cancelled when shutdown begins.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Begins shutdown.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Resolves once shutdown has begun.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Spawns a task that is awaited by [`Self::wait`].
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task);
    }

    /// Cancels the token and waits for every tracked task to finish.
    pub async fn wait(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
