//! Graceful shutdown coordinator for rollgate
//!
//! Turns Ctrl+C / SIGTERM (or a programmatic request) into a single broadcast
//! that the HTTP server waits on before it drains connections and flushes the
//! log files.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Shutdown coordinator shared by the server and its signal listener
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    /// Set once shutdown has been initiated
    shutdown_initiated: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Initiate graceful shutdown. Later calls are no-ops.
    pub fn initiate_shutdown(&self) {
        if !self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            info!("Initiating graceful shutdown...");
            if let Err(e) = self.shutdown_tx.send(()) {
                warn!("No one was listening for the shutdown signal: {}", e);
            }
        }
    }

    /// Resolve once shutdown has been initiated, including before this call
    pub async fn wait_for_shutdown(&self) {
        let mut receiver = self.subscribe();
        // The flag is set before the broadcast, so checking after subscribing misses nothing
        if self.is_shutdown_initiated() {
            return;
        }
        let _ = receiver.recv().await;
    }

    /// Wait for SIGTERM or Ctrl+C, then initiate shutdown
    pub async fn wait_for_shutdown_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
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
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C signal");
            }
            _ = terminate => {
                info!("Received SIGTERM signal");
            }
            _ = self.wait_for_shutdown() => {}
        }

        self.initiate_shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Duration, sleep, timeout};

    #[tokio::test]
    async fn test_shutdown_coordinator_creation() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_shutdown_initiated());
    }

    #[tokio::test]
    async fn test_shutdown_initiation() {
        let coordinator = ShutdownCoordinator::new();
        let mut receiver = coordinator.subscribe();

        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown();

        assert!(coordinator.is_shutdown_initiated());
        assert!(receiver.recv().await.is_ok());
        // Only one broadcast for repeated calls
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_after_the_fact() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();

        let waited = timeout(Duration::from_millis(200), coordinator.wait_for_shutdown()).await;
        assert!(waited.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_wakes_waiters() {
        let coordinator = ShutdownCoordinator::new();
        let waiter = coordinator.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_shutdown().await });

        sleep(Duration::from_millis(50)).await;
        coordinator.initiate_shutdown();

        let joined = timeout(Duration::from_secs(2), handle).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_signal_listener_stops_on_manual_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let listener = coordinator.clone();
        let handle = tokio::spawn(async move { listener.wait_for_shutdown_signal().await });

        sleep(Duration::from_millis(50)).await;
        coordinator.initiate_shutdown();

        assert!(timeout(Duration::from_secs(2), handle).await.is_ok());
    }
}
