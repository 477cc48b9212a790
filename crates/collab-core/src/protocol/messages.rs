//! LAN-Collab wire message types.
//!
//! Every message is framed by a 24-byte header (see [`crate::protocol::codec`]).
//! Payloads never carry network addresses: the receiving transport attaches
//! the peer address it observed.

use crate::domain::collaboration::{CollaborationRequest, Subscriber};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Total size of the common message header in bytes.
pub const HEADER_SIZE: usize = 24;

/// Upper bound on a payload accepted from the network.
///
/// Announcements fit in a single datagram; anything larger is hostile or
/// corrupt.
pub const MAX_PAYLOAD_SIZE: usize = 8 * 1024;

// ── Message type codes ────────────────────────────────────────────────────────

/// All message type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    // Broadcast discovery
    Announce = 0x01,
    // Point-to-point calls
    Subscribe = 0x02,
    StopCollaborating = 0x03,
    Ack = 0x04,
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(MessageType::Announce),
            0x02 => Ok(MessageType::Subscribe),
            0x03 => Ok(MessageType::StopCollaborating),
            0x04 => Ok(MessageType::Ack),
            _ => Err(()),
        }
    }
}

// ── Common message header ─────────────────────────────────────────────────────

/// 24-byte header prepended to every message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Protocol version; always [`PROTOCOL_VERSION`].
    pub version: u8,
    /// Identifies the payload type.
    pub message_type: MessageType,
    /// Length of the payload in bytes (not including this header).
    pub payload_length: u32,
    /// Monotonically increasing per-process counter.
    pub sequence_number: u64,
    /// Microseconds since Unix epoch at time of generation.
    pub timestamp_us: u64,
}

// ── Per-message payload structs ───────────────────────────────────────────────

/// ANNOUNCE (0x01): broadcast intent to work on a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceMessage {
    pub filename: String,
    pub sender_name: String,
}

/// SUBSCRIBE (0x02): ask the announcer to report when the session stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeMessage {
    /// File of the session being subscribed to.
    pub filename: String,
    /// Sender name of the session, echoed back from the announcement.
    pub sender_name: String,
    /// Display name of the subscribing node.
    pub subscriber_name: String,
}

/// STOP_COLLABORATING (0x03): the owner ended the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopCollaboratingMessage {
    pub filename: String,
    pub sender_name: String,
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// All valid LAN-Collab messages, discriminated by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollabMessage {
    Announce(AnnounceMessage),
    Subscribe(SubscribeMessage),
    StopCollaborating(StopCollaboratingMessage),
    /// Empty acknowledgement closing a point-to-point call.
    Ack,
}

impl CollabMessage {
    /// Returns the [`MessageType`] discriminant for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            CollabMessage::Announce(_) => MessageType::Announce,
            CollabMessage::Subscribe(_) => MessageType::Subscribe,
            CollabMessage::StopCollaborating(_) => MessageType::StopCollaborating,
            CollabMessage::Ack => MessageType::Ack,
        }
    }

    /// Builds the announcement for `request`.
    pub fn announce(request: &CollaborationRequest) -> Self {
        CollabMessage::Announce(AnnounceMessage {
            filename: request.filename.clone(),
            sender_name: request.sender_name.clone(),
        })
    }

    /// Builds a subscription to `request` on behalf of `subscriber_name`.
    pub fn subscribe(request: &CollaborationRequest, subscriber_name: &str) -> Self {
        CollabMessage::Subscribe(SubscribeMessage {
            filename: request.filename.clone(),
            sender_name: request.sender_name.clone(),
            subscriber_name: subscriber_name.to_string(),
        })
    }

    /// Builds the stop notification for `request`.
    pub fn stop_collaborating(request: &CollaborationRequest) -> Self {
        CollabMessage::StopCollaborating(StopCollaboratingMessage {
            filename: request.filename.clone(),
            sender_name: request.sender_name.clone(),
        })
    }
}

impl AnnounceMessage {
    /// Converts to a domain request stamped with the observed `peer` address.
    pub fn into_request(self, peer: std::net::IpAddr) -> CollaborationRequest {
        CollaborationRequest::new(self.filename, self.sender_name, peer)
    }
}

impl SubscribeMessage {
    /// Converts to the domain pair, stamping both with the observed `peer`.
    ///
    /// The request's `sender_address` is the subscriber's address here, as it
    /// is the node the call came from; only the filename matters for
    /// registry lookups.
    pub fn into_parts(self, peer: std::net::IpAddr) -> (CollaborationRequest, Subscriber) {
        (
            CollaborationRequest::new(self.filename, self.sender_name, peer),
            Subscriber::new(self.subscriber_name, peer),
        )
    }
}

impl StopCollaboratingMessage {
    /// Converts to a domain request stamped with the observed `peer` address.
    pub fn into_request(self, peer: std::net::IpAddr) -> CollaborationRequest {
        CollaborationRequest::new(self.filename, self.sender_name, peer)
    }
}
