//! UDP announce listener.
//!
//! Binds the broadcast port and feeds every decoded `Announce` datagram to
//! the coordinator, tagged with the datagram's source address.
//!
//! # How UDP broadcast discovery works (for beginners)
//!
//! UDP (User Datagram Protocol) is a lightweight, connectionless networking
//! protocol.  Unlike TCP it does not guarantee delivery, ordering, or duplicate
//! prevention.  Those trade-offs are fine for announcements:
//!
//! 1. The announcing node sends one datagram to the subnet broadcast address
//!    (e.g. `192.168.1.255`) on the broadcast port.  Every node on the subnet
//!    receives it, including the sender itself.
//!
//! 2. Each node's listener decodes the datagram.  The source address reported
//!    by the OS, never a field inside the payload, identifies the announcer.
//!
//! 3. The coordinator drops its own echo, and an idle node answers the
//!    announcer over TCP (see [`super::unicast`]).
//!
//! Each datagram is handled on its own task because answering may take up to
//! the call timeout; the receive loop keeps draining the socket meanwhile.

use std::net::SocketAddr;
use std::sync::Arc;

use collab_core::protocol::{HEADER_SIZE, MAX_PAYLOAD_SIZE};
use collab_core::{decode_message, CollabMessage};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::listener::ListenerHandle;
use crate::application::coordinate_collaboration::{CollaborationCoordinator, TransportError};

/// Binds `addr` and starts the announce receive loop.
///
/// # Errors
///
/// Returns [`TransportError::Bind`] if the socket cannot be bound.
pub async fn start_announce_listener(
    addr: SocketAddr,
    coordinator: Arc<CollaborationCoordinator>,
) -> Result<ListenerHandle, TransportError> {
    let socket = UdpSocket::bind(addr)
        .await
        .map_err(|source| TransportError::Bind { addr, source })?;
    let local_addr = socket.local_addr()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(announce_loop(socket, coordinator, shutdown_rx));

    info!("announce listener on UDP {local_addr}");
    Ok(ListenerHandle::new(
        "announce listener",
        local_addr,
        shutdown_tx,
        task,
    ))
}

async fn announce_loop(
    socket: UdpSocket,
    coordinator: Arc<CollaborationCoordinator>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; HEADER_SIZE + MAX_PAYLOAD_SIZE];

    loop {
        let (len, src) = tokio::select! {
            _ = shutdown.changed() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("announce recv error: {e}");
                    continue;
                }
            },
        };

        match decode_message(&buf[..len]) {
            Ok((message @ CollabMessage::Announce(_), _)) => {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    if let Err(e) = coordinator.handle_message(message, src.ip()).await {
                        warn!("announcement from {src} not accepted: {e}");
                    }
                });
            }
            Ok((other, _)) => {
                warn!(
                    "unexpected {:?} on broadcast port from {src}",
                    other.message_type()
                );
            }
            Err(e) => {
                debug!("failed to decode datagram from {src}: {e}");
            }
        }
    }

    info!("announce listener stopped");
}
