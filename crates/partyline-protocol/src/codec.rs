//! Byte encoding for envelopes.
//!
//! The gateway only needs "turn a value into bytes and back", so that is
//! all [`Codec`] asks for. [`JsonCodec`] is the one browsers speak.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// # Errors
    /// [`ProtocolError::Encode`] if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// # Errors
    /// [`ProtocolError::Decode`] on malformed or mismatched input.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// JSON over `serde_json`.
///
/// ```rust
/// use partyline_protocol::{Codec, Envelope, JsonCodec, Payload, SystemMessage};
///
/// let codec = JsonCodec;
/// let envelope = Envelope {
///     seq: 1,
///     timestamp: 5000,
///     payload: Payload::System(SystemMessage::Heartbeat { client_time: 5000 }),
/// };
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientCommand, Envelope, Payload, RoomId};

    #[test]
    fn test_json_codec_decodes_client_frame() {
        let raw = br#"{
            "seq": 3,
            "timestamp": 120,
            "payload": {"type": "Command", "data": {"type": "Resync", "roomId": "ABCDEF"}}
        }"#;
        let envelope: Envelope = JsonCodec.decode(raw).unwrap();
        assert_eq!(envelope.seq, 3);
        assert_eq!(
            envelope.payload,
            Payload::Command(ClientCommand::Resync {
                room_id: RoomId::new("ABCDEF")
            })
        );
    }

    #[test]
    fn test_json_codec_garbage_is_decode_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_missing_fields_is_decode_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(br#"{"seq": 1}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
