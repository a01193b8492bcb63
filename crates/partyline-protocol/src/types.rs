//! The room data model as it travels on the wire.
//!
//! Everything here is a plain value record: the server's room actor owns
//! the authoritative copy and ships these types to clients inside
//! snapshots and events. Field names serialize in camelCase so browser
//! clients can consume them unchanged.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque player identifier issued by the identity provider.
///
/// `#[serde(transparent)]` keeps it a bare JSON string, so clients see
/// `"9b2f…"` rather than `{"0": "9b2f…"}`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Wraps any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short room code clients type to join (`"K7QX2M"`).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a team, unique within its room.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TeamId(pub String);

impl TeamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something that can hold a turn and earn points: a single player, or a
/// team when the room plays in team mode.
///
/// Serialized adjacently tagged: `{"kind": "team", "id": "t1"}`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum ParticipantId {
    Player(PlayerId),
    Team(TeamId),
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(id) => write!(f, "player:{id}"),
            Self::Team(id) => write!(f, "team:{id}"),
        }
    }
}

impl From<PlayerId> for ParticipantId {
    fn from(id: PlayerId) -> Self {
        Self::Player(id)
    }
}

impl From<TeamId> for ParticipantId {
    fn from(id: TeamId) -> Self {
        Self::Team(id)
    }
}

// ---------------------------------------------------------------------------
// Players and teams
// ---------------------------------------------------------------------------

/// A player as seen by every room they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
}

impl Player {
    pub fn new(id: PlayerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// A team inside a room. `member_ids` keeps join order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub color: String,
    pub member_ids: Vec<PlayerId>,
    pub score: u32,
}

impl Team {
    pub fn has_member(&self, player_id: &PlayerId) -> bool {
        self.member_ids.contains(player_id)
    }
}

// ---------------------------------------------------------------------------
// Room classification
// ---------------------------------------------------------------------------

/// The ten party games the platform hosts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum GameKind {
    Alias,
    Taboo,
    FiveSeconds,
    WhatAmI,
    WordChain,
    TruthOrDare,
    GroupMemory,
    ChineseWhispers,
    Trivia,
    MysteryCase,
}

impl GameKind {
    /// Every kind, in catalog order.
    pub const ALL: [GameKind; 10] = [
        GameKind::Alias,
        GameKind::Taboo,
        GameKind::FiveSeconds,
        GameKind::WhatAmI,
        GameKind::WordChain,
        GameKind::TruthOrDare,
        GameKind::GroupMemory,
        GameKind::ChineseWhispers,
        GameKind::Trivia,
        GameKind::MysteryCase,
    ];
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Alias => "alias",
            Self::Taboo => "taboo",
            Self::FiveSeconds => "five-seconds",
            Self::WhatAmI => "what-am-i",
            Self::WordChain => "word-chain",
            Self::TruthOrDare => "truth-or-dare",
            Self::GroupMemory => "group-memory",
            Self::ChineseWhispers => "chinese-whispers",
            Self::Trivia => "trivia",
            Self::MysteryCase => "mystery-case",
        };
        f.write_str(name)
    }
}

/// Whether a room is listed openly or gated behind a password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// Coarse room lifecycle shown in lobbies.
///
/// ```text
/// Waiting ──→ Playing ──→ Finished
/// ```
///
/// Only forward moves are transitions; an explicit game reset is the one
/// path back to `Waiting`, and it does not go through
/// [`can_transition_to`](Self::can_transition_to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Waiting => 0,
            Self::Playing => 1,
            Self::Finished => 2,
        }
    }

    /// `true` when `target` lies strictly ahead of `self`.
    pub fn can_transition_to(self, target: Self) -> bool {
        target.rank() > self.rank()
    }

    /// Finished rooms reject joins.
    pub fn is_joinable(self) -> bool {
        !matches!(self, Self::Finished)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Where the turn engine currently sits.
///
/// ```text
/// Idle ──start──→ RoundActive ──wrap──→ RoundEnded ──start──→ RoundActive
///                     │                      │
///                     └──────────┬───────────┘
///                                ▼
///                           GameFinished
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum GamePhase {
    #[default]
    Idle,
    RoundActive,
    RoundEnded,
    GameFinished,
}

// ---------------------------------------------------------------------------
// Turns
// ---------------------------------------------------------------------------

/// Lifecycle of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TurnStatus {
    /// Pending holder of the next round; no clock running.
    Waiting,
    Active,
    Completed,
    Skipped,
}

/// The current turn. Replaced wholesale on every advance; `turn_id` only
/// ever grows, which is how late submissions are recognized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnState {
    pub turn_id: u64,
    pub holder: ParticipantId,
    pub round: u32,
    pub started_at: DateTime<Utc>,
    pub deadline_at: Option<DateTime<Utc>>,
    pub status: TurnStatus,
}

/// What a client reports about the turn it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outcome {
    Correct,
    TimedOut,
    Skipped,
    /// A free-text answer judged by the game variant.
    Answer { text: String },
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Per-room game settings chosen at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettings {
    /// Play in teams. Only allowed for kinds that support it.
    pub team_based: bool,
    /// First participant to reach this score wins outright.
    pub score_to_win: Option<u32>,
    /// Seconds per turn; falls back to the kind's default.
    pub time_limit: Option<u32>,
    /// Number of rounds before the game finishes on its own.
    pub rounds_count: Option<u32>,
    /// Only cards at this level. Untagged cards always qualify.
    pub difficulty: Option<Difficulty>,
    /// Only cards from these categories; empty means all of them.
    /// Untagged cards always qualify.
    pub categories: Vec<String>,
}

/// Card difficulty a room can restrict its deck to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

// ---------------------------------------------------------------------------
// Snapshots and listings
// ---------------------------------------------------------------------------

/// One row of the score table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub participant: ParticipantId,
    pub score: u32,
}

/// Full client-visible state of a room at a given event sequence.
///
/// The password hash never appears here. `scores` is kept sorted by
/// participant so two snapshots of the same state compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub name: String,
    pub game_kind: GameKind,
    pub visibility: Visibility,
    pub host_player_id: PlayerId,
    pub members: Vec<Player>,
    pub teams: Vec<Team>,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
    pub settings: RoomSettings,
    pub phase: GamePhase,
    pub round: u32,
    pub prompt: Option<String>,
    pub turn: Option<TurnState>,
    pub scores: Vec<ScoreEntry>,
    pub winners: Vec<ParticipantId>,
    /// Sequence number of the last event folded into this snapshot.
    pub sequence: u64,
}

impl RoomSnapshot {
    pub fn member(&self, player_id: &PlayerId) -> Option<&Player> {
        self.members.iter().find(|p| &p.id == player_id)
    }

    pub fn is_member(&self, player_id: &PlayerId) -> bool {
        self.member(player_id).is_some()
    }

    /// Score of a participant, zero when it never scored.
    pub fn score_of(&self, participant: &ParticipantId) -> u32 {
        self.scores
            .iter()
            .find(|e| &e.participant == participant)
            .map_or(0, |e| e.score)
    }
}

/// Lobby row for a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub game_kind: GameKind,
    pub visibility: Visibility,
    pub status: RoomStatus,
    pub host_player_id: PlayerId,
    pub player_count: usize,
    pub max_players: usize,
    pub created_at: DateTime<Utc>,
}

/// Optional narrowing for room listings. Every field left `None` matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomFilter {
    pub status: Option<RoomStatus>,
    pub game_kind: Option<GameKind>,
    pub visibility: Option<Visibility>,
}

impl RoomFilter {
    pub fn matches(&self, summary: &RoomSummary) -> bool {
        self.status.is_none_or(|s| s == summary.status)
            && self.game_kind.is_none_or(|k| k == summary.game_kind)
            && self.visibility.is_none_or(|v| v == summary.visibility)
    }
}

// =========================================================================
// Tests
// =========================================================================
