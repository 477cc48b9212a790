//! Shutdown handle shared by the UDP and TCP receive loops.

use std::net::SocketAddr;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// A running receive loop.
///
/// Dropping the handle does not stop the loop; call
/// [`shutdown`](Self::shutdown).
pub struct ListenerHandle {
    name: &'static str,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub(crate) fn new(
        name: &'static str,
        local_addr: SocketAddr,
        shutdown_tx: watch::Sender<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            local_addr,
            shutdown_tx,
            task,
        }
    }

    /// The address the socket is actually bound to (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals the loop to exit and waits for it.
    ///
    /// The loop owns its socket, so the port is free again once this returns.
    pub async fn shutdown(self) {
        // The loop may already have exited; a send error only means that.
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!("{} task ended abnormally: {e}", self.name);
        }
    }
}
