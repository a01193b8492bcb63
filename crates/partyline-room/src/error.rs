//! Error types for the room layer.

use partyline_protocol::{ErrorCode, PlayerId, RoomId};

/// Everything a room operation can refuse with.
///
/// None of these stop a room task; the gateway turns them into a
/// rejection for the one client that asked.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Malformed request: blank name, missing password, bad team setup.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("room {0} not found")]
    NotFound(RoomId),

    #[error("wrong password for room {0}")]
    WrongPassword(RoomId),

    /// The game in this room is over; no new members.
    #[error("room {0} is closed")]
    RoomClosed(RoomId),

    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The room or its game is not in a state that allows this.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("not enough players: need {needed}, have {have}")]
    InsufficientPlayers { needed: usize, have: usize },

    #[error("player {0} is not the host")]
    NotHost(PlayerId),

    #[error("player {0} does not hold the current turn")]
    NotYourTurn(PlayerId),

    /// The submission named a turn that already moved on.
    #[error("turn {submitted} is stale")]
    StaleTurn { submitted: u64 },

    #[error("player {0} is not a member of room {1}")]
    NotMember(PlayerId, RoomId),

    /// The generated code is taken. Retried by the registry.
    #[error("room id {0} is already taken")]
    DuplicateRoomId(RoomId),

    /// The room task is gone or its queue is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// A deck file could not be loaded.
    #[error("invalid deck: {0}")]
    InvalidDeck(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl RoomError {
    /// The client-visible reason code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) | Self::InvalidDeck(_) => ErrorCode::ValidationError,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::WrongPassword(_) => ErrorCode::WrongPassword,
            Self::RoomClosed(_) => ErrorCode::RoomClosed,
            Self::RoomFull(_) => ErrorCode::RoomFull,
            Self::InvalidTransition(_) => ErrorCode::InvalidTransition,
            Self::InsufficientPlayers { .. } => ErrorCode::InsufficientPlayers,
            Self::NotHost(_) => ErrorCode::NotHost,
            Self::NotYourTurn(_) => ErrorCode::NotYourTurn,
            Self::StaleTurn { .. } => ErrorCode::StaleTurn,
            Self::NotMember(..) => ErrorCode::NotMember,
            Self::DuplicateRoomId(_)
            | Self::Unavailable(_)
            | Self::PasswordHash(_) => ErrorCode::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_maps_taxonomy() {
        let room = RoomId::new("ABCDEF");
        assert_eq!(
            RoomError::WrongPassword(room.clone()).code(),
            ErrorCode::WrongPassword
        );
        assert_eq!(
            RoomError::StaleTurn { submitted: 3 }.code(),
            ErrorCode::StaleTurn
        );
        assert_eq!(
            RoomError::DuplicateRoomId(room).code(),
            ErrorCode::Unavailable
        );
    }
}
