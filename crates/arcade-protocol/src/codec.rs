//! Codec trait and the JSON implementation.
//!
//! A codec converts between Rust types and the payload bytes carried by a
//! frame. The session handler is generic over [`Codec`], so the wire
//! encoding can be swapped without touching dispatch code.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses UTF-8 JSON (via `serde_json`).
///
/// ```rust
/// use arcade_protocol::{Codec, JsonCodec, Request};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Request::ListRooms).unwrap();
/// assert_eq!(bytes, br#"{"cmd":"list_rooms"}"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let result: Result<serde_json::Value, _> =
            JsonCodec.decode(&[0xff, 0xfe, 0x7b]);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_response_is_plain_json_object() {
        let bytes = JsonCodec
            .encode(&crate::Response::error("nope"))
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["status"], "ERROR");
        assert_eq!(value["message"], "nope");
    }
}
