use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Time connections get after `abort` before the server is dropped
const ABORT_DEADLINE: Duration = Duration::from_secs(5);

/// Two-phase shutdown driven by Ctrl+C or SIGTERM.
///
/// `draining` fires on the first signal and stops the listener from accepting
/// connections. `abort` fires once the grace period has passed; requests
/// still talking to the storage account are then cancelled, and connections
/// still open `ABORT_DEADLINE` later (streaming downloads) are abandoned.
#[derive(Clone, Default)]
pub struct Shutdown {
    draining: CancellationToken,
    abort: CancellationToken,
}

impl Shutdown {
    /// Parent of every per-request cancellation token
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }

    /// Resolves when the server should stop accepting connections
    pub async fn draining(self) {
        self.draining.cancelled().await
    }

    /// Drive `server` until it completes or the abort deadline passes.
    pub async fn serve_until_aborted<F, E>(self, server: F) -> Result<(), E>
    where
        F: Future<Output = Result<(), E>>,
    {
        let deadline = async {
            self.abort.cancelled().await;
            tokio::time::sleep(ABORT_DEADLINE).await;
        };

        tokio::select! {
            result = server => result,
            _ = deadline => {
                warn!(
                    "Connections still open {:?} after abort, closing them",
                    ABORT_DEADLINE
                );
                Ok(())
            }
        }
    }

    /// Wait for a signal, start draining, then abort in-flight work after
    /// `grace_period`.
    pub async fn watch(self, grace_period: Duration) {
        wait_for_signal().await;
        self.begin(grace_period).await
    }

    async fn begin(self, grace_period: Duration) {
        info!(
            "Shutdown requested, draining in-flight requests for up to {:?}",
            grace_period
        );
        self.draining.cancel();

        tokio::time::sleep(grace_period).await;
        warn!("Grace period exceeded, cancelling remaining storage operations");
        self.abort.cancel();
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_drains_before_aborting() {
        let shutdown = Shutdown::default();
        let abort = shutdown.abort_token();
        let draining = shutdown.clone().draining();

        let phases = tokio::spawn(shutdown.begin(Duration::from_secs(30)));

        draining.await;
        assert!(!abort.is_cancelled());

        phases.await.unwrap();
        assert!(abort.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_connections_do_not_outlive_abort() {
        let shutdown = Shutdown::default();
        let started = tokio::time::Instant::now();
        tokio::spawn(shutdown.clone().begin(Duration::from_secs(30)));

        let never_finishes = std::future::pending::<Result<(), std::io::Error>>();
        shutdown.serve_until_aborted(never_finishes).await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(30) + ABORT_DEADLINE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_result_is_returned_before_abort() {
        let shutdown = Shutdown::default();
        let failed = async { Err::<(), _>("bind lost") };

        assert_eq!(shutdown.serve_until_aborted(failed).await, Err("bind lost"));
    }
}
