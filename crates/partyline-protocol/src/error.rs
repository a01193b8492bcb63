//! Protocol-layer errors.

/// Something went wrong turning bytes into messages or back, or a
/// decoded message broke the conversation rules.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The client speaks a different protocol revision.
    #[error("protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    /// Well-formed but out of place, e.g. a command before `Hello`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
