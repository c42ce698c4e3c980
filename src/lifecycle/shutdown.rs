//! Signal handling for graceful shutdown

use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error};

/// Handles shutdown signals (SIGTERM, SIGINT)
#[derive(Debug, Default, Clone, Copy)]
pub struct ShutdownSignal;

impl ShutdownSignal {
    pub fn new() -> Self {
        Self
    }

    /// Wait for a shutdown signal. If the handlers cannot be registered,
    /// fall back to Ctrl-C alone.
    pub async fn wait(&self) {
        let handlers = signal(SignalKind::terminate())
            .and_then(|sigterm| Ok((sigterm, signal(SignalKind::interrupt())?)));

        let (mut sigterm, mut sigint) = match handlers {
            Ok(handlers) => handlers,
            Err(e) => {
                error!(?e, "failed to register signal handlers");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(?e, "failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                debug!("received SIGTERM");
            }
            _ = sigint.recv() => {
                debug!("received SIGINT");
            }
        }
    }
}
