//! Messages exchanged between clients and the session gateway.
//!
//! Every frame on the wire is an [`Envelope`]. Clients number their
//! envelopes with `seq`; the server echoes that number back as the
//! `request_id` of the matching [`Reply`], so clients can correlate
//! answers even while room events stream in between.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    GameKind, Outcome, Player, RoomEvent, RoomFilter, RoomId, RoomSettings,
    RoomSnapshot, RoomSummary, TeamId, Visibility,
};

// ---------------------------------------------------------------------------
// Connection-level messages
// ---------------------------------------------------------------------------

/// Connection plumbing: handshake, keep-alive, goodbye, and errors that
/// are not tied to a specific request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum SystemMessage {
    /// Client → Server, first frame. A `resume_token` from an earlier
    /// `Welcome` rebinds the previous identity within the grace period.
    Hello {
        version: u32,
        display_name: String,
        resume_token: Option<String>,
    },

    /// Server → Client: identity and the token to resume it later.
    Welcome {
        player: Player,
        resume_token: String,
        server_time: u64,
    },

    /// Either direction.
    Disconnect { reason: String },

    /// Client → Server keep-alive.
    Heartbeat { client_time: u64 },

    /// Server → Client: echoes `client_time` for RTT estimation.
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Server → Client: a failure outside any request (bad handshake,
    /// undecodable frame).
    Error { code: ErrorCode, message: String },
}

// ---------------------------------------------------------------------------
// Client intents
// ---------------------------------------------------------------------------

/// Intents a connected player can issue. Identity comes from the
/// connection, never from the command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    CreateRoom {
        name: String,
        game_kind: GameKind,
        visibility: Visibility,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        settings: RoomSettings,
    },
    JoinRoom {
        room_id: RoomId,
        #[serde(default)]
        password: Option<String>,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    StartGame {
        room_id: RoomId,
    },
    /// Report the outcome of turn `turn_id`. A stale id is rejected.
    SubmitOutcome {
        room_id: RoomId,
        turn_id: u64,
        outcome: Outcome,
    },
    EndGame {
        room_id: RoomId,
    },
    ResetGame {
        room_id: RoomId,
    },
    CreateTeam {
        room_id: RoomId,
        name: String,
        color: String,
    },
    JoinTeam {
        room_id: RoomId,
        team_id: TeamId,
    },
    ListRooms {
        #[serde(default)]
        filter: RoomFilter,
    },
    /// Ask for a fresh baseline after detecting a gap.
    Resync {
        room_id: RoomId,
    },
    Rename {
        display_name: String,
    },
}

impl ClientCommand {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "CreateRoom",
            Self::JoinRoom { .. } => "JoinRoom",
            Self::LeaveRoom { .. } => "LeaveRoom",
            Self::StartGame { .. } => "StartGame",
            Self::SubmitOutcome { .. } => "SubmitOutcome",
            Self::EndGame { .. } => "EndGame",
            Self::ResetGame { .. } => "ResetGame",
            Self::CreateTeam { .. } => "CreateTeam",
            Self::JoinTeam { .. } => "JoinTeam",
            Self::ListRooms { .. } => "ListRooms",
            Self::Resync { .. } => "Resync",
            Self::Rename { .. } => "Rename",
        }
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Stable, client-visible reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    WrongPassword,
    RoomClosed,
    RoomFull,
    InvalidTransition,
    InsufficientPlayers,
    NotHost,
    NotYourTurn,
    StaleTurn,
    NotMember,
    Unavailable,
    BadRequest,
    Unauthorized,
    VersionMismatch,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Same spelling as the wire form.
        let text = match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::WrongPassword => "WRONG_PASSWORD",
            Self::RoomClosed => "ROOM_CLOSED",
            Self::RoomFull => "ROOM_FULL",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::InsufficientPlayers => "INSUFFICIENT_PLAYERS",
            Self::NotHost => "NOT_HOST",
            Self::NotYourTurn => "NOT_YOUR_TURN",
            Self::StaleTurn => "STALE_TURN",
            Self::NotMember => "NOT_MEMBER",
            Self::Unavailable => "UNAVAILABLE",
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::VersionMismatch => "VERSION_MISMATCH",
        };
        f.write_str(text)
    }
}

/// A structured refusal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: ErrorCode,
    pub message: String,
}

/// Successful command results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ReplyBody {
    Ack,
    RoomCreated { room_id: RoomId },
    /// Join and resync both answer with the full room state.
    Snapshot { snapshot: Box<RoomSnapshot> },
    RoomList { rooms: Vec<RoomSummary> },
    Renamed { player: Player },
}

/// Outcome of one command: `{"ok": {...}}` or `{"rejected": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplyResult {
    Ok(ReplyBody),
    Rejected(Rejection),
}

/// The answer to the envelope whose `seq` equals `request_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub request_id: u64,
    pub result: ReplyResult,
}

impl Reply {
    pub fn ok(request_id: u64, body: ReplyBody) -> Self {
        Self {
            request_id,
            result: ReplyResult::Ok(body),
        }
    }

    pub fn rejected(
        request_id: u64,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            result: ReplyResult::Rejected(Rejection {
                code,
                message: message.into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// What an envelope carries.
///
/// Adjacently tagged so the gateway can route on `type` before looking
/// at the body: `{"type": "Command", "data": {"type": "LeaveRoom", ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),
    /// Client → Server.
    Command(ClientCommand),
    /// Server → Client.
    Reply(Reply),
    /// Server → Client, pushed as rooms change.
    Event(RoomEvent),
}

/// The top-level frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sender-local counter. For client commands it doubles as the
    /// request id echoed in the reply.
    pub seq: u64,
    /// Milliseconds since the sender started.
    pub timestamp: u64,
    pub payload: Payload,
}
