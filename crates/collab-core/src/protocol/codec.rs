//! Binary codec for encoding and decoding LAN-Collab protocol messages.
//!
//! Wire format:
//! ```text
//! [version:1][msg_type:1][reserved:2][payload_len:4][seq:8][timestamp_us:8][payload:N]
//! ```
//! Total header size: 24 bytes. All multi-byte integers are big-endian.
//! Strings are UTF-8 preceded by a big-endian `u16` byte length.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::messages::{
    AnnounceMessage, CollabMessage, MessageHeader, MessageType, StopCollaboratingMessage,
    SubscribeMessage, HEADER_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION,
};
use thiserror::Error;

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The message type byte in the header is not a recognized value.
    #[error("unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The payload could not be parsed (string too long, UTF-8 error, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The encoded payload length field does not match the actual data available.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`CollabMessage`] into a byte vector including the 24-byte header.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if a string field is longer
/// than `u16::MAX` bytes or the payload exceeds [`MAX_PAYLOAD_SIZE`].
///
/// # Examples
///
/// ```rust
/// use collab_core::protocol::{decode_message, encode_message};
/// use collab_core::protocol::messages::CollabMessage;
///
/// let bytes = encode_message(&CollabMessage::Ack, 7, 0).unwrap();
/// let (decoded, consumed) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, CollabMessage::Ack);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_message(
    msg: &CollabMessage,
    sequence_number: u64,
    timestamp_us: u64,
) -> Result<Vec<u8>, ProtocolError> {
    let payload = encode_payload(msg)?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::MalformedPayload(format!(
            "payload of {} bytes exceeds limit of {MAX_PAYLOAD_SIZE}",
            payload.len()
        )));
    }
    let payload_len = payload.len() as u32;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(PROTOCOL_VERSION);
    buf.push(msg.message_type() as u8);
    buf.push(0x00); // reserved
    buf.push(0x00); // reserved
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(&sequence_number.to_be_bytes());
    buf.extend_from_slice(&timestamp_us.to_be_bytes());

    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Encodes a [`CollabMessage`] using the current system time as the timestamp.
///
/// # Errors
///
/// See [`encode_message`].
pub fn encode_message_now(
    msg: &CollabMessage,
    sequence_number: u64,
) -> Result<Vec<u8>, ProtocolError> {
    let timestamp_us = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64;
    encode_message(msg, sequence_number, timestamp_us)
}

/// Parses and validates the 24-byte header at the start of `bytes`.
///
/// Stream transports call this on the header alone to learn how many payload
/// bytes to read next.
///
/// # Errors
///
/// Returns [`ProtocolError`] for a short buffer, wrong version, unknown type,
/// or a declared payload larger than [`MAX_PAYLOAD_SIZE`].
pub fn decode_header(bytes: &[u8]) -> Result<MessageHeader, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let msg_type_byte = bytes[1];
    let message_type = MessageType::try_from(msg_type_byte)
        .map_err(|_| ProtocolError::UnknownMessageType(msg_type_byte))?;

    // bytes[2..4] are reserved – ignored on decode

    let payload_length = read_u32(bytes, 4)?;
    if payload_length as usize > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::MalformedPayload(format!(
            "declared payload of {payload_length} bytes exceeds limit of {MAX_PAYLOAD_SIZE}"
        )));
    }

    Ok(MessageHeader {
        version,
        message_type,
        payload_length,
        sequence_number: read_u64(bytes, 8)?,
        timestamp_us: read_u64(bytes, 16)?,
    })
}

/// Decodes one [`CollabMessage`] from the beginning of `bytes`.
///
/// Returns the decoded message and the total number of bytes consumed
/// (header + payload).
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are malformed.
pub fn decode_message(bytes: &[u8]) -> Result<(CollabMessage, usize), ProtocolError> {
    let header = decode_header(bytes)?;
    let payload_len = header.payload_length as usize;

    let total_needed = HEADER_SIZE + payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared: payload_len,
            available: bytes.len() - HEADER_SIZE,
        });
    }

    let payload = &bytes[HEADER_SIZE..total_needed];
    let msg = decode_payload(header.message_type, payload)?;
    Ok((msg, total_needed))
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(msg: &CollabMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    match msg {
        CollabMessage::Announce(m) => {
            write_length_prefixed_string(&mut buf, &m.filename)?;
            write_length_prefixed_string(&mut buf, &m.sender_name)?;
        }
        CollabMessage::Subscribe(m) => {
            write_length_prefixed_string(&mut buf, &m.filename)?;
            write_length_prefixed_string(&mut buf, &m.sender_name)?;
            write_length_prefixed_string(&mut buf, &m.subscriber_name)?;
        }
        CollabMessage::StopCollaborating(m) => {
            write_length_prefixed_string(&mut buf, &m.filename)?;
            write_length_prefixed_string(&mut buf, &m.sender_name)?;
        }
        CollabMessage::Ack => {} // empty payload
    }
    Ok(buf)
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_payload(msg_type: MessageType, p: &[u8]) -> Result<CollabMessage, ProtocolError> {
    match msg_type {
        MessageType::Announce => {
            let (filename, off) = read_length_prefixed_string(p, 0)?;
            let (sender_name, _) = read_length_prefixed_string(p, off)?;
            Ok(CollabMessage::Announce(AnnounceMessage {
                filename,
                sender_name,
            }))
        }
        MessageType::Subscribe => {
            let (filename, off) = read_length_prefixed_string(p, 0)?;
            let (sender_name, off) = read_length_prefixed_string(p, off)?;
            let (subscriber_name, _) = read_length_prefixed_string(p, off)?;
            Ok(CollabMessage::Subscribe(SubscribeMessage {
                filename,
                sender_name,
                subscriber_name,
            }))
        }
        MessageType::StopCollaborating => {
            let (filename, off) = read_length_prefixed_string(p, 0)?;
            let (sender_name, _) = read_length_prefixed_string(p, off)?;
            Ok(CollabMessage::StopCollaborating(StopCollaboratingMessage {
                filename,
                sender_name,
            }))
        }
        MessageType::Ack => Ok(CollabMessage::Ack),
    }
}

// ── Primitive helpers ─────────────────────────────────────────────────────────

fn write_length_prefixed_string(buf: &mut Vec<u8>, s: &str) -> Result<(), ProtocolError> {
    let len = u16::try_from(s.len()).map_err(|_| {
        ProtocolError::MalformedPayload(format!("string of {} bytes is too long", s.len()))
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Reads a `u16`-length-prefixed UTF-8 string at `offset`.
///
/// Returns the string and the offset just past it.
fn read_length_prefixed_string(p: &[u8], offset: usize) -> Result<(String, usize), ProtocolError> {
    require_len(p, offset + 2, "string length")?;
    let len = u16::from_be_bytes([p[offset], p[offset + 1]]) as usize;
    let start = offset + 2;
    require_len(p, start + len, "string bytes")?;
    let s = std::str::from_utf8(&p[start..start + len])
        .map_err(|e| ProtocolError::MalformedPayload(format!("invalid UTF-8: {e}")))?;
    Ok((s.to_string(), start + len))
}

fn read_u32(p: &[u8], offset: usize) -> Result<u32, ProtocolError> {
    require_len(p, offset + 4, "u32")?;
    Ok(u32::from_be_bytes([p[offset], p[offset + 1], p[offset + 2], p[offset + 3]]))
}

fn read_u64(p: &[u8], offset: usize) -> Result<u64, ProtocolError> {
    require_len(p, offset + 8, "u64")?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&p[offset..offset + 8]);
    Ok(u64::from_be_bytes(raw))
}

fn require_len(p: &[u8], needed: usize, what: &str) -> Result<(), ProtocolError> {
    if p.len() < needed {
        return Err(ProtocolError::MalformedPayload(format!(
            "{what}: need {needed} bytes, have {}",
            p.len()
        )));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn announce() -> CollabMessage {
        CollabMessage::Announce(AnnounceMessage {
            filename: "c0ffee123456.ext".to_string(),
            sender_name: "alpha".to_string(),
        })
    }

    #[test]
    fn test_encode_writes_header_fields() {
        // Arrange / Act
        let bytes = encode_message(&announce(), 0x0102, 0x0A0B).unwrap();

        // Assert
        assert_eq!(bytes[0], PROTOCOL_VERSION);
        assert_eq!(bytes[1], MessageType::Announce as u8);
        assert_eq!(&bytes[2..4], &[0, 0]);
        let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        assert_eq!(payload_len, bytes.len() - HEADER_SIZE);
        let header = decode_header(&bytes).unwrap();
        assert_eq!(header.sequence_number, 0x0102);
        assert_eq!(header.timestamp_us, 0x0A0B);
    }

    #[test]
    fn test_decode_announce_returns_original() {
        let bytes = encode_message(&announce(), 1, 2).unwrap();
        let (decoded, consumed) = decode_message(&bytes).unwrap();
        assert_eq!(decoded, announce());
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_decode_consumes_only_first_frame() {
        // Arrange: two frames back to back
        let mut bytes = encode_message(&CollabMessage::Ack, 1, 0).unwrap();
        let first_len = bytes.len();
        bytes.extend(encode_message(&announce(), 2, 0).unwrap());

        // Act
        let (first, consumed) = decode_message(&bytes).unwrap();
        let (second, _) = decode_message(&bytes[consumed..]).unwrap();

        // Assert
        assert_eq!(first, CollabMessage::Ack);
        assert_eq!(consumed, first_len);
        assert_eq!(second, announce());
    }

    #[test]
    fn test_decode_rejects_short_header() {
        let result = decode_message(&[PROTOCOL_VERSION, 0x01, 0, 0]);
        assert_eq!(
            result,
            Err(ProtocolError::InsufficientData {
                needed: HEADER_SIZE,
                available: 4
            })
        );
    }

    #[test]
    fn test_decode_rejects_wrong_version() {
        let mut bytes = encode_message(&CollabMessage::Ack, 0, 0).unwrap();
        bytes[0] = 0x7F;
        assert_eq!(
            decode_message(&bytes),
            Err(ProtocolError::UnsupportedVersion(0x7F))
        );
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let mut bytes = encode_message(&CollabMessage::Ack, 0, 0).unwrap();
        bytes[1] = 0xEE;
        assert_eq!(
            decode_message(&bytes),
            Err(ProtocolError::UnknownMessageType(0xEE))
        );
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let bytes = encode_message(&announce(), 0, 0).unwrap();
        let truncated = &bytes[..bytes.len() - 3];
        assert!(matches!(
            decode_message(truncated),
            Err(ProtocolError::PayloadLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        // Arrange: hand-build an Announce whose filename is not UTF-8
        let payload = [0x00, 0x02, 0xFF, 0xFE, 0x00, 0x00];
        let mut bytes = vec![PROTOCOL_VERSION, MessageType::Announce as u8, 0, 0];
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        bytes.extend_from_slice(&payload);

        // Act / Assert
        assert!(matches!(
            decode_message(&bytes),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_header_rejects_oversized_payload_declaration() {
        let mut bytes = encode_message(&CollabMessage::Ack, 0, 0).unwrap();
        bytes[4..8].copy_from_slice(&((MAX_PAYLOAD_SIZE as u32) + 1).to_be_bytes());
        assert!(matches!(
            decode_header(&bytes),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_encode_rejects_string_longer_than_u16() {
        let msg = CollabMessage::Announce(AnnounceMessage {
            filename: "x".repeat(usize::from(u16::MAX) + 1),
            sender_name: "alpha".to_string(),
        });
        assert!(matches!(
            encode_message(&msg, 0, 0),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_encode_message_now_sets_nonzero_timestamp() {
        let bytes = encode_message_now(&CollabMessage::Ack, 0).unwrap();
        assert!(decode_header(&bytes).unwrap().timestamp_us > 0);
    }
}
