//! Length-prefixed frame codec for the stdio pipes.
//!
//! Each message is an 8-byte little-endian unsigned 64-bit payload length
//! followed by a UTF-8 JSON payload. Both sides of the wire use the same
//! framing. The smallest well-formed JSON payload is two bytes, so shorter
//! lengths are rejected outright.

use std::io::{Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Size of the length header in bytes.
pub const HEADER_LEN: usize = 8;

/// Smallest payload length accepted by the codec.
pub const MIN_PAYLOAD_LEN: u64 = 2;

/// Largest payload length accepted by the codec.
///
/// A graph input for a large workspace runs to megabytes, not gigabytes;
/// anything beyond this is a corrupt or hostile header.
pub const MAX_PAYLOAD_LEN: u64 = 1 << 30;

/// Errors raised by the frame codec.
#[derive(Debug, Error)]
pub enum FrameError {
    /// EOF arrived inside a length header that had already begun.
    #[error("frame header truncated mid-read")]
    TruncatedHeader,

    /// EOF arrived before the announced payload length was read.
    #[error("frame payload truncated: expected {expected} bytes, read {read}")]
    TruncatedPayload {
        /// Payload length the header announced.
        expected: u64,
        /// Bytes actually read.
        read: u64,
    },

    /// The header announced a payload size outside the accepted range.
    #[error("frame payload size {size} outside accepted range")]
    InvalidPayloadSize {
        /// The announced size.
        size: u64,
    },

    /// The payload was not valid JSON for the expected message type.
    #[error("malformed message payload: {0}")]
    MalformedMessage(#[source] serde_json::Error),

    /// An I/O error occurred on the pipe.
    #[error("frame I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes one framed payload.
///
/// # Errors
///
/// Returns [`FrameError::InvalidPayloadSize`] for payloads shorter than
/// [`MIN_PAYLOAD_LEN`], or [`FrameError::Io`] if the write fails.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len = payload.len() as u64;
    if len < MIN_PAYLOAD_LEN || len > MAX_PAYLOAD_LEN {
        return Err(FrameError::InvalidPayloadSize { size: len });
    }
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Reads one framed payload.
///
/// Returns `Ok(None)` when the pipe is cleanly closed at a frame boundary,
/// which ends the conversation.
///
/// # Errors
///
/// Returns [`FrameError::TruncatedHeader`] when EOF interrupts a header,
/// [`FrameError::TruncatedPayload`] when EOF interrupts a payload,
/// [`FrameError::InvalidPayloadSize`] for out-of-range lengths, and
/// [`FrameError::Io`] for other I/O failures.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError> {
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(FrameError::TruncatedHeader);
        }
        filled += n;
    }

    let len = u64::from_le_bytes(header);
    if len < MIN_PAYLOAD_LEN || len > MAX_PAYLOAD_LEN {
        return Err(FrameError::InvalidPayloadSize { size: len });
    }

    #[allow(clippy::cast_possible_truncation)]
    let mut payload = vec![0u8; len as usize];
    let mut read = 0usize;
    while read < payload.len() {
        let n = reader.read(&mut payload[read..])?;
        if n == 0 {
            return Err(FrameError::TruncatedPayload {
                expected: len,
                read: read as u64,
            });
        }
        read += n;
    }
    Ok(Some(payload))
}

/// Serializes a message and writes it as one frame.
///
/// # Errors
///
/// Returns [`FrameError::MalformedMessage`] if the message cannot be
/// serialized, or any error of [`write_frame`].
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<(), FrameError> {
    let payload = serde_json::to_vec(message).map_err(FrameError::MalformedMessage)?;
    write_frame(writer, &payload)
}

/// Reads one frame and decodes it as a message.
///
/// Returns `Ok(None)` at a clean end of conversation.
///
/// # Errors
///
/// Returns [`FrameError::MalformedMessage`] if the payload does not decode
/// as `T`, or any error of [`read_frame`].
pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<Option<T>, FrameError> {
    let Some(payload) = read_frame(reader)? else {
        return Ok(None);
    };
    let message = serde_json::from_slice(&payload).map_err(FrameError::MalformedMessage)?;
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::minimal(b"{}".to_vec())]
    #[case::typical(br#"{"kind":"actionComplete","success":true}"#.to_vec())]
    #[case::binary_safe(vec![b'"'; 64])]
    fn write_then_read_round_trips(#[case] payload: Vec<u8>) {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &payload).expect("write");
        let mut cursor = Cursor::new(buffer);
        let back = read_frame(&mut cursor).expect("read").expect("frame");
        assert_eq!(back, payload);
    }

    #[test]
    fn eof_at_frame_boundary_ends_conversation() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(read_frame(&mut cursor).expect("read").is_none());
    }

    #[test]
    fn partial_header_is_truncated_header() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"{}").expect("write");
        buffer.truncate(HEADER_LEN - 1);
        let mut cursor = Cursor::new(buffer);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(FrameError::TruncatedHeader)
        ));
    }

    #[test]
    fn short_payload_is_truncated_payload() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, br#"{"a":1}"#).expect("write");
        buffer.truncate(buffer.len() - 3);
        let mut cursor = Cursor::new(buffer);
        match read_frame(&mut cursor) {
            Err(FrameError::TruncatedPayload { expected, read }) => {
                assert_eq!(expected, 7);
                assert_eq!(read, 4);
            }
            other => panic!("expected TruncatedPayload, got {other:?}"),
        }
    }

    #[rstest]
    #[case::empty(&b""[..])]
    #[case::one_byte(&b"x"[..])]
    fn undersized_payload_rejected_on_write(#[case] payload: &[u8]) {
        let mut buffer = Vec::new();
        assert!(matches!(
            write_frame(&mut buffer, payload),
            Err(FrameError::InvalidPayloadSize { .. })
        ));
    }

    #[test]
    fn oversized_header_rejected_on_read() {
        let mut buffer = (MAX_PAYLOAD_LEN + 1).to_le_bytes().to_vec();
        buffer.extend_from_slice(b"{}");
        let mut cursor = Cursor::new(buffer);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(FrameError::InvalidPayloadSize { .. })
        ));
    }

    #[test]
    fn typed_round_trip_and_decode_failure() {
        #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
        struct Probe {
            value: u32,
        }

        let mut buffer = Vec::new();
        write_message(&mut buffer, &Probe { value: 7 }).expect("write");
        let mut cursor = Cursor::new(buffer);
        let back: Probe = read_message(&mut cursor).expect("read").expect("message");
        assert_eq!(back, Probe { value: 7 });

        let mut garbage = Vec::new();
        write_frame(&mut garbage, b"[]").expect("write");
        let mut cursor = Cursor::new(garbage);
        let result: Result<Option<Probe>, _> = read_message(&mut cursor);
        assert!(matches!(result, Err(FrameError::MalformedMessage(_))));
    }
}
