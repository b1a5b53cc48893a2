//! Graceful shutdown handling.
//!
//! A [`ShutdownController`] flips a watch channel once; every transport holds a
//! [`ShutdownSignal`] and stops taking new work when it fires. Requests already
//! being dispatched run to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Shutdown signal that can be awaited.
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait for the shutdown signal.
    pub async fn recv(&mut self) {
        // Wait until the value becomes true; a dropped controller also ends the wait.
        let _ = self.receiver.wait_for(|&v| v).await;
    }

    /// Check if shutdown has been signaled without blocking.
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Controller for managing graceful shutdown.
pub struct ShutdownController {
    sender: watch::Sender<bool>,
    shutting_down: AtomicBool,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender,
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Get a shutdown signal receiver.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }

    /// Check if shutdown is in progress.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Initiate shutdown. Later calls are no-ops.
    pub fn shutdown(&self) {
        if self
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Initiating graceful shutdown...");
            let _ = self.sender.send(true);
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared shutdown controller type.
pub type SharedShutdownController = Arc<ShutdownController>;

/// Create a new shared shutdown controller.
pub fn new_shutdown_controller() -> SharedShutdownController {
    Arc::new(ShutdownController::new())
}

/// Install signal handlers for graceful shutdown.
///
/// Ctrl+C everywhere; SIGTERM and SIGHUP on Unix.
pub async fn install_signal_handlers(controller: SharedShutdownController) {
    let ctrl_c_controller = controller.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                ctrl_c_controller.shutdown();
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C signal: {}", e);
            }
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        for (kind, label) in [
            (SignalKind::terminate(), "SIGTERM"),
            (SignalKind::hangup(), "SIGHUP"),
        ] {
            let signal_controller = controller.clone();
            tokio::spawn(async move {
                match signal(kind) {
                    Ok(mut stream) => {
                        stream.recv().await;
                        info!("Received {}, initiating shutdown...", label);
                        signal_controller.shutdown();
                    }
                    Err(e) => {
                        error!("Failed to install {} handler: {}", label, e);
                    }
                }
            });
        }
    }

    #[cfg(not(unix))]
    drop(controller);
}
