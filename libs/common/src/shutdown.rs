//! Shutdown signal handling
//!
//! One place to wait for the operator or the init system to ask us to
//! stop, so every service shuts down the same way.

use tracing::{debug, warn};

/// Which signal ended the wait. Useful for logging at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    CtrlC,
    Terminate,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::CtrlC => write!(f, "SIGINT"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Wait until the process receives Ctrl+C or, on Unix, SIGTERM.
///
/// ```ignore
/// let sig = common::shutdown::wait_for_signal().await;
/// info!("shutting down on {}", sig);
/// ```
pub async fn wait_for_signal() -> ShutdownSignal {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!("SIGTERM handler unavailable ({}), Ctrl+C only", e);
                None
            },
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupt received");
                ShutdownSignal::CtrlC
            },
            _ = async {
                match term.as_mut() {
                    Some(sig) => { sig.recv().await; },
                    None => std::future::pending::<()>().await,
                }
            } => {
                debug!("terminate received");
                ShutdownSignal::Terminate
            },
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        ShutdownSignal::CtrlC
    }
}
