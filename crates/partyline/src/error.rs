//! Unified error type for Partyline.

use partyline_protocol::{ErrorCode, ProtocolError};
use partyline_room::RoomError;
use partyline_session::SessionError;
use partyline_transport::TransportError;

/// Top-level error wrapping every layer's error.
#[derive(Debug, thiserror::Error)]
pub enum PartylineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    /// Reading a deck file, binding, and similar.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PartylineError {
    /// The reason code a client sees for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Room(e) => e.code(),
            Self::Session(SessionError::InvalidDisplayName(_)) => ErrorCode::ValidationError,
            Self::Session(_) => ErrorCode::Unauthorized,
            Self::Protocol(ProtocolError::VersionMismatch { .. }) => ErrorCode::VersionMismatch,
            Self::Protocol(_) => ErrorCode::BadRequest,
            Self::Transport(_) | Self::Io(_) => ErrorCode::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partyline_protocol::{PlayerId, RoomId};

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let wrapped: PartylineError = err.into();
        assert!(matches!(wrapped, PartylineError::Transport(_)));
        assert!(wrapped.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let wrapped: PartylineError = err.into();
        assert!(matches!(wrapped, PartylineError::Protocol(_)));
        assert_eq!(wrapped.code(), ErrorCode::BadRequest);
    }

    #[test]
    fn test_version_mismatch_code() {
        let wrapped: PartylineError = ProtocolError::VersionMismatch { expected: 1, got: 9 }.into();
        assert_eq!(wrapped.code(), ErrorCode::VersionMismatch);
    }

    #[test]
    fn test_session_errors_map_to_codes() {
        let invalid: PartylineError = SessionError::InvalidDisplayName("blank".into()).into();
        assert_eq!(invalid.code(), ErrorCode::ValidationError);

        let expired: PartylineError = SessionError::SessionExpired(PlayerId::new("p1")).into();
        assert_eq!(expired.code(), ErrorCode::Unauthorized);
    }

    #[test]
    fn test_room_error_keeps_its_code() {
        let wrapped: PartylineError = RoomError::RoomFull(RoomId::new("ABCDEF")).into();
        assert!(matches!(wrapped, PartylineError::Room(_)));
        assert_eq!(wrapped.code(), ErrorCode::RoomFull);
    }
}
