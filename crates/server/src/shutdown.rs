//! Signal handling.
//!
//! A command interrupted by Ctrl-C or SIGTERM is abandoned; whatever it
//! already published to the coordination store stays published.

use std::future::Future;

use tokio::signal;

/// Wait for a shutdown signal (Ctrl-C or SIGTERM).
///
/// On Unix systems, it also handles SIGTERM for container environments.
#[allow(clippy::expect_used)]
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, abandoning command");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, abandoning command");
        }
    }
}

/// Runs `work` until it finishes or `signal` fires, whichever comes first.
/// Returns `None` when interrupted.
pub async fn until_shutdown<F, S>(work: F, signal: S) -> Option<F::Output>
where
    F: Future,
    S: Future<Output = ()>,
{
    tokio::select! {
        output = work => Some(output),
        () = signal => None,
    }
}
