//! # Partyline
//!
//! Real-time room and game synchronization for party games.
//!
//! Clients connect over WebSocket, say `Hello`, and then create, join,
//! and play in rooms. Every room is a single-writer actor that numbers
//! its events; clients fold the event stream into a local copy and ask
//! for a `Resync` whenever they notice a gap.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use partyline::prelude::*;
//!
//! # async fn run() -> Result<(), PartylineError> {
//! let server = PartylineServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(AnonymousIdentity)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::PartylineError;
pub use server::{PartylineServer, PartylineServerBuilder};

/// Everything needed to run a server or write a client against it.
pub mod prelude {
    pub use crate::{PartylineError, PartylineServer, PartylineServerBuilder};
    pub use partyline_protocol::{
        ClientCommand, Codec, Envelope, ErrorCode, EventKind, GameKind,
        JsonCodec, Outcome, ParticipantId, Payload, Player, PlayerId, Reply,
        ReplyBody, ReplyResult, RoomEvent, RoomFilter, RoomId, RoomReplica,
        RoomSettings, RoomSnapshot, RoomStatus, RoomSummary, SystemMessage,
        Visibility, PROTOCOL_VERSION,
    };
    pub use partyline_room::{
        DeckSet, GameCatalog, MemorySnapshotStore, RegistryConfig, RoomError,
        SnapshotStore,
    };
    pub use partyline_session::{
        AnonymousIdentity, IdentityProvider, SessionConfig, SessionError,
    };
}
