//! Error types for the session layer.

use partyline_protocol::PlayerId;

/// Failures around identity issuance and session lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Display names must be non-blank and reasonably short.
    #[error("invalid display name: {0}")]
    InvalidDisplayName(String),

    #[error("session not found for player {0}")]
    NotFound(PlayerId),

    /// The resume token is unknown, or was already replaced.
    #[error("invalid resume token")]
    InvalidToken,

    /// The grace period elapsed before the client came back.
    #[error("session expired for player {0}")]
    SessionExpired(PlayerId),

    /// One live connection per player.
    #[error("player {0} already has an active session")]
    AlreadyConnected(PlayerId),
}
