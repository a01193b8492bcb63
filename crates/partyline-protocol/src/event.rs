//! Room events: the replication stream.
//!
//! Every accepted mutation of a room becomes exactly one [`RoomEvent`]
//! carrying a per-room sequence number. Events carry enough data that
//! folding them, in order, over an empty state reproduces the server's
//! snapshot; [`RoomSnapshot::apply`] is that fold.

use serde::{Deserialize, Serialize};

use crate::{
    GamePhase, Outcome, ParticipantId, Player, PlayerId, RoomId,
    RoomSnapshot, RoomStatus, ScoreEntry, Team, TeamId, TurnState,
};

/// One committed change to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomEvent {
    pub room_id: RoomId,
    /// Strictly increasing per room, starting at 1.
    pub sequence: u64,
    pub kind: EventKind,
}

/// What changed.
///
/// Internally tagged by `type`, fields in camelCase:
/// `{"type": "playerLeft", "playerId": "p2", "newHost": null}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum EventKind {
    /// First event of every room; carries the initial state.
    RoomCreated { snapshot: Box<RoomSnapshot> },
    PlayerJoined { player: Player },
    /// The player is gone from members and teams. `new_host` is set when
    /// the leaver was host.
    PlayerLeft {
        player_id: PlayerId,
        new_host: Option<PlayerId>,
    },
    PlayerRenamed {
        player_id: PlayerId,
        display_name: String,
    },
    StatusChanged { status: RoomStatus },
    TeamCreated { team: Team },
    /// The player moved into `team_id`, leaving any previous team.
    TeamJoined { team_id: TeamId, player_id: PlayerId },
    /// The turn engine moved. `turn` is `None` once the game is over.
    TurnAdvanced {
        phase: GamePhase,
        turn: Option<TurnState>,
        outcome: Option<Outcome>,
    },
    ScoreAwarded {
        participant: ParticipantId,
        delta: u32,
        total: u32,
    },
    RoundPromptChanged { round: u32, prompt: Option<String> },
    GameFinished { winners: Vec<ParticipantId> },
    /// Back to the lobby: scores, rounds, and turn state cleared.
    GameReset,
    RoomDestroyed,
}

impl EventKind {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomCreated { .. } => "roomCreated",
            Self::PlayerJoined { .. } => "playerJoined",
            Self::PlayerLeft { .. } => "playerLeft",
            Self::PlayerRenamed { .. } => "playerRenamed",
            Self::StatusChanged { .. } => "statusChanged",
            Self::TeamCreated { .. } => "teamCreated",
            Self::TeamJoined { .. } => "teamJoined",
            Self::TurnAdvanced { .. } => "turnAdvanced",
            Self::ScoreAwarded { .. } => "scoreAwarded",
            Self::RoundPromptChanged { .. } => "roundPromptChanged",
            Self::GameFinished { .. } => "gameFinished",
            Self::GameReset => "gameReset",
            Self::RoomDestroyed => "roomDestroyed",
        }
    }
}

impl RoomSnapshot {
    /// Builds the state described by a `RoomCreated` event.
    pub fn from_created(event: &RoomEvent) -> Option<Self> {
        match &event.kind {
            EventKind::RoomCreated { snapshot } => {
                let mut snapshot = (**snapshot).clone();
                snapshot.sequence = event.sequence;
                Some(snapshot)
            }
            _ => None,
        }
    }

    /// Folds one event into this snapshot.
    ///
    /// The caller is responsible for ordering; this only records the
    /// event's sequence number as the new baseline.
    pub fn apply(&mut self, event: &RoomEvent) {
        match &event.kind {
            EventKind::RoomCreated { snapshot } => {
                *self = (**snapshot).clone();
            }
            EventKind::PlayerJoined { player } => {
                if !self.is_member(&player.id) {
                    self.members.push(player.clone());
                }
            }
            EventKind::PlayerLeft {
                player_id,
                new_host,
            } => {
                self.members.retain(|p| &p.id != player_id);
                for team in &mut self.teams {
                    team.member_ids.retain(|id| id != player_id);
                }
                if let Some(host) = new_host {
                    self.host_player_id = host.clone();
                }
            }
            EventKind::PlayerRenamed {
                player_id,
                display_name,
            } => {
                if let Some(p) =
                    self.members.iter_mut().find(|p| &p.id == player_id)
                {
                    p.display_name = display_name.clone();
                }
            }
            EventKind::StatusChanged { status } => self.status = *status,
            EventKind::TeamCreated { team } => self.teams.push(team.clone()),
            EventKind::TeamJoined { team_id, player_id } => {
                for team in &mut self.teams {
                    team.member_ids.retain(|id| id != player_id);
                    if &team.id == team_id {
                        team.member_ids.push(player_id.clone());
                    }
                }
            }
            EventKind::TurnAdvanced { phase, turn, .. } => {
                self.phase = *phase;
                self.turn = turn.clone();
            }
            EventKind::ScoreAwarded {
                participant, total, ..
            } => {
                set_score(&mut self.scores, participant, *total);
                if let ParticipantId::Team(team_id) = participant {
                    if let Some(team) =
                        self.teams.iter_mut().find(|t| &t.id == team_id)
                    {
                        team.score = *total;
                    }
                }
            }
            EventKind::RoundPromptChanged { round, prompt } => {
                self.round = *round;
                self.prompt = prompt.clone();
            }
            EventKind::GameFinished { winners } => {
                self.winners = winners.clone();
            }
            EventKind::GameReset => {
                self.status = RoomStatus::Waiting;
                self.phase = GamePhase::Idle;
                self.round = 0;
                self.prompt = None;
                self.turn = None;
                self.scores.clear();
                self.winners.clear();
                for team in &mut self.teams {
                    team.score = 0;
                }
            }
            EventKind::RoomDestroyed => {}
        }
        self.sequence = event.sequence;
    }
}

/// Inserts or updates a score row, keeping rows sorted by participant.
fn set_score(scores: &mut Vec<ScoreEntry>, participant: &ParticipantId, total: u32) {
    match scores.binary_search_by(|e| e.participant.cmp(participant)) {
        Ok(idx) => scores[idx].score = total,
        Err(idx) => scores.insert(
            idx,
            ScoreEntry {
                participant: participant.clone(),
                score: total,
            },
        ),
    }
}
