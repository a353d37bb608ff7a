// Unix signal handling for graceful shutdown

use anyhow::Result;
use futures::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::future::Future;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Future resolving on the first SIGTERM or SIGINT
pub fn create_shutdown_listener() -> Result<impl Future<Output = ()>> {
    let mut signals = Signals::new([SIGTERM, SIGINT])?;

    Ok(async move {
        while let Some(signal) = signals.next().await {
            match signal {
                SIGTERM => {
                    info!("Received SIGTERM - graceful shutdown initiated");
                    break;
                }
                SIGINT => {
                    info!("Received SIGINT (Ctrl+C) - graceful shutdown initiated");
                    break;
                }
                _ => debug!(signal = signal, "Ignoring unexpected signal"),
            }
        }
    })
}

/// Fans one shutdown event out to the HTTP server and background tasks
pub struct ShutdownCoordinator {
    tx: broadcast::Sender<()>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Future completing once `trigger` is called; for `with_graceful_shutdown`
    pub fn notified(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.subscribe();
        async move {
            let _ = rx.recv().await;
        }
    }

    pub fn trigger(&self) {
        let receivers = self.tx.send(()).unwrap_or(0);
        info!(receivers = receivers, "Shutdown broadcast to subsystems");
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
