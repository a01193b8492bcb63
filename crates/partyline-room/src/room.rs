//! The room record: membership, host, teams, and status.
//!
//! Owned exclusively by the room's actor. Checks here are synchronous
//! and side-effect free until the actor decides to commit.

use chrono::{DateTime, Utc};
use partyline_protocol::{
    GameKind, ParticipantId, Player, PlayerId, RoomId, RoomSettings,
    RoomSnapshot, RoomStatus, RoomSummary, Team, TeamId, Visibility,
};

use crate::{GameVariant, RoomError, TurnEngine};

/// Longest room name accepted, in characters.
pub const MAX_ROOM_NAME_CHARS: usize = 64;

/// Longest turn a room may configure, in seconds.
pub const MAX_TURN_SECONDS: u32 = 3600;

// ---------------------------------------------------------------------------
// NewRoom
// ---------------------------------------------------------------------------

/// A room creation request.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: String,
    pub game_kind: GameKind,
    pub visibility: Visibility,
    pub password: Option<String>,
    pub settings: RoomSettings,
}

impl NewRoom {
    /// A public room with default settings.
    pub fn public(name: impl Into<String>, game_kind: GameKind) -> Self {
        Self {
            name: name.into(),
            game_kind,
            visibility: Visibility::Public,
            password: None,
            settings: RoomSettings::default(),
        }
    }

    /// A password-protected room with default settings.
    pub fn private(
        name: impl Into<String>,
        game_kind: GameKind,
        password: impl Into<String>,
    ) -> Self {
        Self {
            visibility: Visibility::Private,
            password: Some(password.into()),
            ..Self::public(name, game_kind)
        }
    }

    pub fn with_settings(mut self, settings: RoomSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Checks the request against the chosen game.
    pub fn validate(&self, variant: &dyn GameVariant) -> Result<(), RoomError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(RoomError::Validation("room name must not be blank".into()));
        }
        if name.chars().count() > MAX_ROOM_NAME_CHARS {
            return Err(RoomError::Validation(format!(
                "room name longer than {MAX_ROOM_NAME_CHARS} characters"
            )));
        }
        if self.visibility == Visibility::Private
            && self.password.as_deref().is_none_or(|p| p.trim().is_empty())
        {
            return Err(RoomError::Validation(
                "private rooms need a password".into(),
            ));
        }
        if self.settings.team_based && !variant.supports_teams() {
            return Err(RoomError::Validation(format!(
                "{} cannot be played in teams",
                variant.kind()
            )));
        }
        if let Some(secs) = self.settings.time_limit {
            if secs == 0 || secs > MAX_TURN_SECONDS {
                return Err(RoomError::Validation(format!(
                    "time limit must be between 1 and {MAX_TURN_SECONDS} seconds"
                )));
            }
        }
        if self.settings.score_to_win == Some(0) {
            return Err(RoomError::Validation("score to win must be positive".into()));
        }
        if self.settings.rounds_count == Some(0) {
            return Err(RoomError::Validation("rounds count must be positive".into()));
        }
        if self.settings.categories.iter().any(|c| c.trim().is_empty()) {
            return Err(RoomError::Validation("category names must not be blank".into()));
        }
        if let Some(setting) = variant.supported_settings().first_unsupported(&self.settings) {
            return Err(RoomError::Validation(format!(
                "{} does not support {setting}",
                variant.kind()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// What a join request amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinCheck {
    Admit,
    AlreadyMember,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub game_kind: GameKind,
    pub visibility: Visibility,
    /// Present iff the room is private.
    password_hash: Option<String>,
    pub host: PlayerId,
    /// Join order.
    members: Vec<Player>,
    /// Creation order.
    teams: Vec<Team>,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
    pub settings: RoomSettings,
    max_players: usize,
    teams_created: u64,
}

impl Room {
    /// A fresh room holding only its host. `password_hash` is dropped
    /// for public rooms.
    pub fn new(
        id: RoomId,
        spec: &NewRoom,
        host: Player,
        password_hash: Option<String>,
        max_players: usize,
        created_at: DateTime<Utc>,
    ) -> Self {
        let password_hash = match spec.visibility {
            Visibility::Private => password_hash,
            Visibility::Public => None,
        };
        Self {
            id,
            name: spec.name.trim().to_string(),
            game_kind: spec.game_kind,
            visibility: spec.visibility,
            password_hash,
            host: host.id.clone(),
            members: vec![host],
            teams: Vec::new(),
            status: RoomStatus::Waiting,
            created_at,
            settings: spec.settings.clone(),
            max_players,
            teams_created: 0,
        }
    }

    pub fn members(&self) -> &[Player] {
        &self.members
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn is_member(&self, player_id: &PlayerId) -> bool {
        self.members.iter().any(|p| &p.id == player_id)
    }

    pub fn is_host(&self, player_id: &PlayerId) -> bool {
        &self.host == player_id
    }

    pub fn team(&self, team_id: &TeamId) -> Option<&Team> {
        self.teams.iter().find(|t| &t.id == team_id)
    }

    pub(crate) fn password_hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    /// Membership rules, in order: closed room, existing member,
    /// password, capacity. `password_ok` is the caller's verification of
    /// the given password against [`Room::password_hash`].
    pub(crate) fn check_join(
        &self,
        player_id: &PlayerId,
        password_ok: bool,
    ) -> Result<JoinCheck, RoomError> {
        if !self.status.is_joinable() {
            return Err(RoomError::RoomClosed(self.id.clone()));
        }
        if self.is_member(player_id) {
            return Ok(JoinCheck::AlreadyMember);
        }
        if self.password_hash.is_some() && !password_ok {
            return Err(RoomError::WrongPassword(self.id.clone()));
        }
        if self.members.len() >= self.max_players {
            return Err(RoomError::RoomFull(self.id.clone()));
        }
        Ok(JoinCheck::Admit)
    }

    pub(crate) fn add_member(&mut self, player: Player) {
        if !self.is_member(&player.id) {
            self.members.push(player);
        }
    }

    /// Removes a member from the room and its teams.
    ///
    /// `None` if the player was not a member. Otherwise the new host, if
    /// hosting moved to the earliest-joined remaining member.
    pub(crate) fn remove_member(
        &mut self,
        player_id: &PlayerId,
    ) -> Option<Option<PlayerId>> {
        let idx = self.members.iter().position(|p| &p.id == player_id)?;
        self.members.remove(idx);
        for team in &mut self.teams {
            team.member_ids.retain(|id| id != player_id);
        }
        if &self.host != player_id {
            return Some(None);
        }
        match self.members.first() {
            Some(next) => {
                self.host = next.id.clone();
                Some(Some(next.id.clone()))
            }
            None => Some(None),
        }
    }

    /// `false` if the player is not a member.
    pub(crate) fn rename_member(&mut self, player_id: &PlayerId, name: &str) -> bool {
        match self.members.iter_mut().find(|p| &p.id == player_id) {
            Some(player) => {
                player.display_name = name.to_string();
                true
            }
            None => false,
        }
    }

    pub(crate) fn create_team(&mut self, name: &str, color: &str) -> Team {
        self.teams_created += 1;
        let team = Team {
            id: TeamId::new(format!("t{}", self.teams_created)),
            name: name.trim().to_string(),
            color: color.trim().to_string(),
            member_ids: Vec::new(),
            score: 0,
        };
        self.teams.push(team.clone());
        team
    }

    /// Moves a member into `team_id`, out of any other team.
    pub(crate) fn join_team(&mut self, team_id: &TeamId, player_id: &PlayerId) {
        for team in &mut self.teams {
            team.member_ids.retain(|id| id != player_id);
            if &team.id == team_id {
                team.member_ids.push(player_id.clone());
            }
        }
    }

    pub(crate) fn set_team_score(&mut self, team_id: &TeamId, total: u32) {
        if let Some(team) = self.teams.iter_mut().find(|t| &t.id == team_id) {
            team.score = total;
        }
    }

    pub(crate) fn reset_team_scores(&mut self) {
        for team in &mut self.teams {
            team.score = 0;
        }
    }

    /// Rotation order for the next round: members in join order, or
    /// non-empty teams in creation order when playing in teams.
    pub fn ring(&self) -> Vec<ParticipantId> {
        if self.settings.team_based {
            self.teams
                .iter()
                .filter(|t| !t.member_ids.is_empty())
                .map(|t| ParticipantId::Team(t.id.clone()))
                .collect()
        } else {
            self.members
                .iter()
                .map(|p| ParticipantId::Player(p.id.clone()))
                .collect()
        }
    }

    /// Whether a ring entry can still hold a turn.
    pub fn is_eligible(&self, participant: &ParticipantId) -> bool {
        match participant {
            ParticipantId::Player(id) => self.is_member(id),
            ParticipantId::Team(id) => {
                self.team(id).is_some_and(|t| !t.member_ids.is_empty())
            }
        }
    }

    /// Whether `player_id` may act for `holder`.
    pub fn acts_for(&self, player_id: &PlayerId, holder: &ParticipantId) -> bool {
        match holder {
            ParticipantId::Player(id) => id == player_id,
            ParticipantId::Team(id) => {
                self.team(id).is_some_and(|t| t.has_member(player_id))
            }
        }
    }

    /// The client-visible state. Never includes the password hash.
    pub fn snapshot(&self, engine: &TurnEngine, sequence: u64) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            game_kind: self.game_kind,
            visibility: self.visibility,
            host_player_id: self.host.clone(),
            members: self.members.clone(),
            teams: self.teams.clone(),
            status: self.status,
            created_at: self.created_at,
            settings: self.settings.clone(),
            phase: engine.phase(),
            round: engine.round(),
            prompt: engine.prompt().map(str::to_string),
            turn: engine.turn().cloned(),
            scores: engine.ledger().snapshot(),
            winners: engine.winners().to_vec(),
            sequence,
        }
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            game_kind: self.game_kind,
            visibility: self.visibility,
            status: self.status,
            host_player_id: self.host.clone(),
            player_count: self.members.len(),
            max_players: self.max_players,
            created_at: self.created_at,
        }
    }
}
