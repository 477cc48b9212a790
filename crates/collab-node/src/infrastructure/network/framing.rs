//! Reading and writing whole frames on a byte stream.
//!
//! TCP delivers a stream of bytes, not messages.  The 24-byte header carries
//! the payload length at bytes 4..8, so a reader first reads exactly one
//! header, validates it, then reads exactly that many payload bytes.

use collab_core::protocol::{
    decode_header, decode_message, encode_message_now, SequenceCounter, HEADER_SIZE,
};
use collab_core::CollabMessage;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::application::coordinate_collaboration::TransportError;

/// Sequence numbers for every frame this process sends, UDP or TCP.
static OUTBOUND_SEQUENCE: SequenceCounter = SequenceCounter::new();

/// Encodes `message` with the next sequence number and current time.
///
/// # Errors
///
/// Returns [`TransportError::Protocol`] if the message cannot be encoded.
pub fn encode_outbound(message: &CollabMessage) -> Result<Vec<u8>, TransportError> {
    Ok(encode_message_now(message, OUTBOUND_SEQUENCE.next())?)
}

/// Reads exactly one frame from `reader`.
///
/// # Errors
///
/// Returns [`TransportError::Io`] if the stream ends early and
/// [`TransportError::Protocol`] if the header or payload is malformed.  The
/// header is validated before the payload is read, so an oversized length
/// never causes a large allocation.
pub async fn read_frame<R>(reader: &mut R) -> Result<CollabMessage, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut frame = vec![0u8; HEADER_SIZE];
    reader.read_exact(&mut frame).await?;

    let header = decode_header(&frame)?;
    frame.resize(HEADER_SIZE + header.payload_length as usize, 0);
    reader.read_exact(&mut frame[HEADER_SIZE..]).await?;

    let (message, _) = decode_message(&frame)?;
    Ok(message)
}

/// Encodes and writes one frame to `writer`, then flushes.
///
/// # Errors
///
/// Returns [`TransportError::Protocol`] for encode failures and
/// [`TransportError::Io`] for write failures.
pub async fn write_frame<W>(writer: &mut W, message: &CollabMessage) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_outbound(message)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
