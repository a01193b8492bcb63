//! Rooms for Partyline.
//!
//! Each room runs as an isolated Tokio task (actor model). The actor
//! owns the room record, its turn engine and score ledger, the event
//! log, and the subscriber queues. It is the only writer, so every
//! mutation of a room is serialized and gets the next sequence number.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates rooms and routes requests to them
//! - [`RoomHandle`]: talks to one running room actor
//! - [`TurnEngine`]: turn rotation, rounds, and game end
//! - [`GameCatalog`] / [`GameVariant`]: per-game rules and decks
//! - [`SnapshotStore`]: where room state is persisted

mod actor;
mod catalog;
mod config;
mod error;
mod ledger;
mod password;
mod registry;
mod replication;
mod room;
mod store;
mod turn;

pub use actor::{JoinOutcome, LeaveOutcome, RoomHandle};
pub use catalog::{
    AnswerRule, Card, DeckGame, DeckSet, Draw, GameCatalog, GameVariant,
    RoundState, SettingSupport, VariantProfile,
};
pub use config::RegistryConfig;
pub use error::RoomError;
pub use ledger::ScoreLedger;
pub use password::{hash_password, verify_password};
pub use registry::{RoomListing, RoomRegistry};
pub use replication::{EventLog, EventSender, Subscribers};
pub use room::{MAX_ROOM_NAME_CHARS, MAX_TURN_SECONDS, NewRoom, Room};
pub use store::{MemorySnapshotStore, SnapshotStore};
pub use turn::{Eligible, POINTS_PER_CORRECT, TurnEngine};
