//! Error types for the protocol layer.
//!
//! The variants split into two groups. `Encode`, `Decode` and
//! `NotAnObject` mean the peer is not speaking the protocol at all; the
//! connection is dropped. `MissingCommand`, `UnknownCommand` and
//! `InvalidFields` are well-formed messages the server cannot act on; they
//! are answered with an `ERROR` response and the connection stays open.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: the bytes are not valid JSON.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// Valid JSON, but not an object.
    #[error("request is not a JSON object")]
    NotAnObject,

    /// The object has no string `cmd` field.
    #[error("request has no `cmd` field")]
    MissingCommand,

    /// The `cmd` tag names no known operation.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// The `cmd` is known but its fields are missing or ill-typed.
    #[error("invalid fields for `{cmd}`: {reason}")]
    InvalidFields { cmd: String, reason: String },
}

impl ProtocolError {
    /// Returns `true` if the peer violated the framing/encoding contract
    /// and the connection should be closed rather than answered.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Encode(_) | Self::Decode(_) | Self::NotAnObject)
    }
}
