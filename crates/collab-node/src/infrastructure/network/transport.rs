//! Socket-backed [`DiscoveryTransport`].
//!
//! - `broadcast` sends one UDP datagram from a single ephemeral socket with
//!   `SO_BROADCAST` enabled.  Nothing confirms delivery.
//! - `unicast_call` opens a fresh TCP connection per call, writes one frame,
//!   and waits for an `Ack` frame.  Connect, write, and wait together are
//!   bounded by `call_timeout`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use collab_core::{CollabMessage, NetworkAddress};
use tokio::net::{TcpStream, UdpSocket};
use tracing::debug;

use super::framing::{encode_outbound, read_frame, write_frame};
use crate::application::coordinate_collaboration::{DiscoveryTransport, TransportError};

/// Returns the wildcard address of `network`'s family paired with `port`.
pub fn wildcard_endpoint(network: &NetworkAddress, port: u16) -> SocketAddr {
    let ip: IpAddr = match network.address() {
        IpAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        IpAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };
    SocketAddr::new(ip, port)
}

/// The production transport.
pub struct SocketTransport {
    udp: UdpSocket,
    call_timeout: Duration,
}

impl SocketTransport {
    /// Binds the outbound broadcast socket on an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Bind`] if the socket cannot be bound, or
    /// [`TransportError::Io`] if broadcast cannot be enabled on it.
    pub async fn bind(
        network: &NetworkAddress,
        call_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let addr = wildcard_endpoint(network, 0);
        let udp = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        if addr.is_ipv4() {
            udp.set_broadcast(true)?;
        }
        Ok(Self { udp, call_timeout })
    }
}

#[async_trait]
impl DiscoveryTransport for SocketTransport {
    async fn broadcast(
        &self,
        target: SocketAddr,
        message: &CollabMessage,
    ) -> Result<(), TransportError> {
        let bytes = encode_outbound(message)?;
        let sent = self.udp.send_to(&bytes, target).await?;
        debug!("broadcast {sent} bytes to {target}");
        Ok(())
    }

    async fn unicast_call(
        &self,
        peer: SocketAddr,
        message: &CollabMessage,
    ) -> Result<(), TransportError> {
        match tokio::time::timeout(self.call_timeout, call(peer, message)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout { peer }),
        }
    }
}

async fn call(peer: SocketAddr, message: &CollabMessage) -> Result<(), TransportError> {
    let mut stream = TcpStream::connect(peer)
        .await
        .map_err(|e| TransportError::PeerUnreachable {
            peer,
            reason: e.to_string(),
        })?;
    write_frame(&mut stream, message).await?;

    match read_frame(&mut stream).await? {
        CollabMessage::Ack => {
            debug!("{:?} acknowledged by {peer}", message.message_type());
            Ok(())
        }
        other => Err(TransportError::UnexpectedReply {
            peer,
            reply: format!("{:?}", other.message_type()),
        }),
    }
}
