//! Varint length-prefix framing for concatenated protobuf messages.
//!
//! Firehose delivers each record as a stream of `ExportMetricsServiceRequest`
//! messages, each preceded by its byte length as a base-128 varint. The
//! framing loop must consume the buffer exactly: a prefix that declares more
//! bytes than remain is corruption and fails the whole record.

use bytes::{Buf, Bytes};
use prost::encoding::{decode_varint, encode_varint};

/// Framing corruption in a delivered record.
#[derive(Debug)]
pub enum FramingError {
    /// The length prefix is not a valid varint (or the buffer ends inside one).
    InvalidPrefix(prost::DecodeError),
    /// The length prefix does not fit in 32 bits.
    LengthOverflow(u64),
    /// The length prefix declares more bytes than remain in the buffer.
    Truncated { declared: usize, remaining: usize },
}

impl std::fmt::Display for FramingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FramingError::InvalidPrefix(e) => write!(f, "invalid length prefix: {}", e),
            FramingError::LengthOverflow(len) => {
                write!(f, "length prefix {} exceeds u32 range", len)
            }
            FramingError::Truncated {
                declared,
                remaining,
            } => write!(
                f,
                "length prefix declares {} bytes but only {} remain",
                declared, remaining
            ),
        }
    }
}

impl std::error::Error for FramingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FramingError::InvalidPrefix(e) => Some(e),
            _ => None,
        }
    }
}

/// Split a delimited stream into individual message payloads, in order.
///
/// An empty blob yields an empty vec. The returned slices share the input
/// buffer, no bytes are copied.
pub fn split(mut blob: Bytes) -> Result<Vec<Bytes>, FramingError> {
    let mut messages = Vec::new();
    while blob.has_remaining() {
        let len = decode_varint(&mut blob).map_err(FramingError::InvalidPrefix)?;
        if len > u32::MAX as u64 {
            return Err(FramingError::LengthOverflow(len));
        }
        let len = len as usize;
        if len > blob.remaining() {
            return Err(FramingError::Truncated {
                declared: len,
                remaining: blob.remaining(),
            });
        }
        messages.push(blob.split_to(len));
    }
    Ok(messages)
}

/// Re-assemble message payloads into a delimited stream, preserving order.
pub fn reframe<I, B>(messages: I) -> Vec<u8>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut out = Vec::new();
    for message in messages {
        let message = message.as_ref();
        encode_varint(message.len() as u64, &mut out);
        out.extend_from_slice(message);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(payloads: &[Vec<u8>]) -> Vec<Bytes> {
        let framed = reframe(payloads);
        split(Bytes::from(framed)).expect("framed stream should split cleanly")
    }

    #[test]
    fn empty_blob_yields_empty_sequence() {
        let messages = split(Bytes::new()).unwrap();
        assert!(messages.is_empty());
    }

    #[test]
    fn single_message_round_trips() {
        let payloads = vec![b"hello".to_vec()];
        let messages = round_trip(&payloads);
        assert_eq!(messages.len(), 1);
        assert_eq!(&messages[0][..], b"hello");
    }

    #[test]
    fn multiple_messages_round_trip_in_order() {
        let payloads = vec![b"first".to_vec(), b"".to_vec(), b"third".to_vec()];
        let messages = round_trip(&payloads);
        assert_eq!(messages.len(), 3);
        assert_eq!(&messages[0][..], b"first");
        assert_eq!(&messages[1][..], b"");
        assert_eq!(&messages[2][..], b"third");
    }

    #[test]
    fn fifty_messages_round_trip() {
        // Lengths span the one-byte/two-byte varint boundary at 128
        let payloads: Vec<Vec<u8>> = (0..50).map(|i| vec![i as u8; i * 5]).collect();
        let messages = round_trip(&payloads);
        assert_eq!(messages.len(), 50);
        for (payload, message) in payloads.iter().zip(&messages) {
            assert_eq!(&payload[..], &message[..]);
        }
    }

    #[test]
    fn truncated_frame_is_an_error() {
        // Prefix declares 10 bytes, only 3 follow
        let mut blob = vec![10u8];
        blob.extend_from_slice(b"abc");
        let err = split(Bytes::from(blob)).unwrap_err();
        match err {
            FramingError::Truncated {
                declared,
                remaining,
            } => {
                assert_eq!(declared, 10);
                assert_eq!(remaining, 3);
            }
            other => panic!("expected Truncated, got {:?}", other),
        }
    }

    #[test]
    fn truncation_after_valid_frames_is_an_error() {
        let mut blob = reframe([b"ok".as_slice()]);
        blob.push(200); // dangling prefix byte with continuation bit set
        let err = split(Bytes::from(blob)).unwrap_err();
        assert!(matches!(err, FramingError::InvalidPrefix(_)));
    }

    #[test]
    fn oversized_prefix_is_an_error() {
        let mut blob = Vec::new();
        encode_varint(u64::from(u32::MAX) + 1, &mut blob);
        let err = split(Bytes::from(blob)).unwrap_err();
        assert!(matches!(err, FramingError::LengthOverflow(_)));
    }

    #[test]
    fn split_does_not_copy_message_bytes() {
        let framed = Bytes::from(reframe([b"payload".as_slice()]));
        let base = framed.as_ptr() as usize;
        let messages = split(framed).unwrap();
        let offset = messages[0].as_ptr() as usize - base;
        assert_eq!(offset, 1); // one varint byte, then the payload in place
    }
}
