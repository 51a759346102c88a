//! Termination signal handling

use std::future::Future;
use tokio::task::JoinHandle;
use tracing::warn;

/// Start listening for SIGINT or SIGTERM in the background
///
/// The returned handle completes once a signal arrives.
pub fn listen() -> JoinHandle<()> {
    tokio::spawn(wait_for_termination())
}

/// Run `work` unless `termination` completes first
///
/// Returns `None` when interrupted. `work` is dropped at that point, which
/// releases whatever it had opened so far.
pub async fn unless_terminated<F>(work: F, termination: &mut JoinHandle<()>) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = termination => None,
        output = work => Some(output),
    }
}

/// Resolves on SIGINT or SIGTERM
pub async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
