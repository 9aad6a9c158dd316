//! OS signal handling.
//!
//! SIGTERM and SIGINT (Ctrl+C elsewhere) cancel the shared shutdown token.
//! The supervisor sees the cancellation and releases the outputs.

use std::fmt;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What triggered shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Sigterm,
    Sigint,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sigterm => write!(f, "SIGTERM"),
            Self::Sigint => write!(f, "SIGINT"),
        }
    }
}

/// Spawns a task that cancels `token` on the first termination signal.
///
/// The task also ends when `token` is cancelled by someone else. If the
/// handlers cannot be installed the error is logged and the token is left
/// alone.
pub fn spawn_signal_listener(token: CancellationToken) -> JoinHandle<Option<ShutdownSignal>> {
    tracing::debug!("installing signal handlers");
    tokio::spawn(async move {
        let received = tokio::select! {
            _ = token.cancelled() => return None,
            received = wait_for_signal() => received?,
        };
        tracing::info!(signal = %received, "shutdown requested");
        token.cancel();
        Some(received)
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> Option<ShutdownSignal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGTERM handler");
            return None;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            return None;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => Some(ShutdownSignal::Sigterm),
        _ = sigint.recv() => Some(ShutdownSignal::Sigint),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Option<ShutdownSignal> {
    match tokio::signal::ctrl_c().await {
        Ok(()) => Some(ShutdownSignal::Sigint),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            None
        }
    }
}
