//! Wire protocol for Partyline.
//!
//! This crate is the contract between the room server and its clients:
//!
//! - **Data model** ([`RoomSnapshot`], [`TurnState`], [`Team`], ...):
//!   the client-visible shape of a room.
//! - **Events** ([`RoomEvent`], [`EventKind`]): the sequence-numbered
//!   replication stream, and [`RoomSnapshot::apply`] to fold it.
//! - **Messages** ([`Envelope`], [`ClientCommand`], [`Reply`]): what
//!   travels over a connection.
//! - **Replica** ([`RoomReplica`]): gap detection and resync on the
//!   receiving side.
//! - **Codec** ([`Codec`], [`JsonCodec`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Gateway (player context) → Room
//! ```

mod codec;
mod error;
mod event;
mod message;
mod replica;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::{EventKind, RoomEvent};
pub use message::{
    ClientCommand, Envelope, ErrorCode, Payload, Rejection, Reply, ReplyBody,
    ReplyResult, SystemMessage,
};
pub use replica::{ApplyResult, RoomReplica};
pub use types::{
    Difficulty, GameKind, GamePhase, Outcome, ParticipantId, Player, PlayerId,
    RoomFilter, RoomId, RoomSettings, RoomSnapshot, RoomStatus, RoomSummary,
    ScoreEntry, Team, TeamId, TurnState, TurnStatus, Visibility,
};

/// Protocol revision clients must announce in `Hello`.
pub const PROTOCOL_VERSION: u32 = 1;
