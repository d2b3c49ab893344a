//! Graceful shutdown handling
//!
//! One [`ShutdownCoordinator`] per process. The HTTP server and the
//! background SLA sweeper both hold a [`ShutdownSignal`] and stop when it
//! fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{watch, Notify};
use tracing::{error, info};

/// Shutdown signal that can be cloned and shared
#[derive(Clone)]
pub struct ShutdownSignal {
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
    watch_rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Wait until shutdown has been initiated.
    pub async fn wait(&self) {
        let mut rx = self.watch_rx.clone();
        if *rx.borrow_and_update() || self.is_shutdown() {
            return;
        }
        tokio::select! {
            _ = rx.changed() => {}
            _ = self.notify.notified() => {}
        }
    }
}

pub struct ShutdownCoordinator {
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
    watch_tx: watch::Sender<bool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (watch_tx, _) = watch::channel(false);
        Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
            watch_tx,
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            shutdown: self.shutdown.clone(),
            notify: self.notify.clone(),
            watch_rx: self.watch_tx.subscribe(),
        }
    }

    /// Initiate shutdown. Later calls are no-ops.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Initiating graceful shutdown...");
        self.notify.notify_waiters();
        self.watch_tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Completes on Ctrl+C or SIGTERM.
///
/// If a handler cannot be installed the failure is logged and that source
/// never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

#[derive(Debug, Clone)]
pub struct GracefulShutdownConfig {
    /// Pause between the signal and refusing new connections.
    pub shutdown_delay: Duration,
}

impl Default for GracefulShutdownConfig {
    fn default() -> Self {
        Self {
            shutdown_delay: Duration::from_secs(1),
        }
    }
}

/// Serve `app` until the coordinator signals shutdown, then drain.
pub async fn serve_with_shutdown(
    listener: tokio::net::TcpListener,
    app: axum::Router,
    coordinator: Arc<ShutdownCoordinator>,
    config: GracefulShutdownConfig,
) -> Result<(), std::io::Error> {
    let signal = coordinator.signal();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.wait().await;
            info!(
                delay = ?config.shutdown_delay,
                "Shutdown signal received, draining connections"
            );
            tokio::time::sleep(config.shutdown_delay).await;
        })
        .await?;

    info!("Graceful shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_observes_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.signal();
        assert!(!signal.is_shutdown());

        coordinator.shutdown();
        assert!(signal.is_shutdown());
        assert!(coordinator.is_shutdown());

        // Already shut down: returns immediately.
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn waiting_task_is_released() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.signal();
        let waiter = tokio::spawn(async move { signal.wait().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.shutdown();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
