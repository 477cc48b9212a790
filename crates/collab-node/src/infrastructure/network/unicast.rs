//! TCP listener for point-to-point calls (`Subscribe`, `StopCollaborating`).
//!
//! Each accepted connection carries exactly one call: one request frame in,
//! one `Ack` frame out, then the connection is closed.  The caller's address
//! as seen by `accept` becomes the subscriber or sender address.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use collab_core::CollabMessage;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::framing::{read_frame, write_frame};
use super::listener::ListenerHandle;
use crate::application::coordinate_collaboration::{CollaborationCoordinator, TransportError};

/// Binds `addr` and starts the accept loop.
///
/// `read_timeout` bounds how long a connected caller may take to send its
/// request frame.
///
/// # Errors
///
/// Returns [`TransportError::Bind`] if the listener cannot be bound.
pub async fn start_call_listener(
    addr: SocketAddr,
    coordinator: Arc<CollaborationCoordinator>,
    read_timeout: Duration,
) -> Result<ListenerHandle, TransportError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(accept_loop(listener, coordinator, read_timeout, shutdown_rx));

    info!("call listener on TCP {local_addr}");
    Ok(ListenerHandle::new("call listener", local_addr, shutdown_tx, task))
}

async fn accept_loop(
    listener: TcpListener,
    coordinator: Arc<CollaborationCoordinator>,
    read_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            },
        };

        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            if let Err(e) = serve_call(stream, peer, &coordinator, read_timeout).await {
                warn!("call from {peer} failed: {e}");
            }
        });
    }

    info!("call listener stopped");
}

async fn serve_call(
    mut stream: TcpStream,
    peer: SocketAddr,
    coordinator: &CollaborationCoordinator,
    read_timeout: Duration,
) -> Result<(), TransportError> {
    let message = tokio::time::timeout(read_timeout, read_frame(&mut stream))
        .await
        .map_err(|_| TransportError::Timeout { peer })??;
    debug!("{:?} call from {peer}", message.message_type());

    if matches!(message, CollabMessage::Announce(_)) {
        warn!("announcement sent to call port by {peer}; ignoring");
        return Ok(());
    }

    match coordinator.handle_message(message, peer.ip()).await {
        Ok(Some(reply)) => write_frame(&mut stream, &reply).await,
        Ok(None) => Ok(()),
        Err(e) => {
            warn!("call from {peer} rejected: {e}");
            Ok(())
        }
    }
}
