//! The turn engine: whose turn it is, what happens on each outcome, and
//! when rounds and games end.
//!
//! The engine is plain data with no clock and no I/O. The room actor
//! passes in `now`, the room settings, and an eligibility check for ring
//! entries (is this player still here, does this team still have
//! members). Every operation validates first and only then mutates, so
//! a refused call leaves the engine untouched. Successful calls return
//! the events to commit, in order.
//!
//! ```text
//! Idle ──start_round──→ RoundActive ──(ring wraps)──→ RoundEnded
//!                         │    ↑                          │
//!                         │    └───────start_round────────┘
//!                         ▼
//!                    GameFinished  (deck exhausted, score reached,
//!                                   rounds done, lone holder, end_game)
//! ```

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use partyline_protocol::{
    EventKind, GamePhase, Outcome, ParticipantId, RoomSettings, TurnState,
    TurnStatus,
};

use crate::{GameVariant, RoomError, RoundState, ScoreLedger};

/// Points for a correct outcome.
pub const POINTS_PER_CORRECT: u32 = 1;

/// Eligibility of a ring entry at the moment of the call.
pub type Eligible<'a> = &'a dyn Fn(&ParticipantId) -> bool;

#[derive(Debug)]
pub struct TurnEngine {
    variant: Arc<dyn GameVariant>,
    phase: GamePhase,
    /// Canonical rotation order, rebuilt at every round start.
    ring: Vec<ParticipantId>,
    holder_index: usize,
    round: u32,
    turn: Option<TurnState>,
    /// Highest turn id handed out. Never reset, so stale submissions
    /// from before a reset are still recognized.
    last_turn_id: u64,
    round_state: RoundState,
    prompt: Option<String>,
    /// Whether any turn has been opened on `prompt` yet.
    prompt_played: bool,
    ledger: ScoreLedger,
    winners: Vec<ParticipantId>,
}

impl TurnEngine {
    pub fn new(variant: Arc<dyn GameVariant>) -> Self {
        Self {
            variant,
            phase: GamePhase::Idle,
            ring: Vec::new(),
            holder_index: 0,
            round: 0,
            turn: None,
            last_turn_id: 0,
            round_state: RoundState::default(),
            prompt: None,
            prompt_played: false,
            ledger: ScoreLedger::new(),
            winners: Vec::new(),
        }
    }

    pub fn variant(&self) -> &Arc<dyn GameVariant> {
        &self.variant
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn turn(&self) -> Option<&TurnState> {
        self.turn.as_ref()
    }

    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    /// Set when the game finishes. Empty when nobody scored.
    pub fn winners(&self) -> &[ParticipantId] {
        &self.winners
    }

    pub fn ring(&self) -> &[ParticipantId] {
        &self.ring
    }

    /// The turn a deadline should be armed for, if any.
    pub fn active_turn_id(&self) -> Option<u64> {
        match (&self.turn, self.phase) {
            (Some(turn), GamePhase::RoundActive) => Some(turn.turn_id),
            _ => None,
        }
    }

    /// Seconds per turn: the room override or the kind's default.
    pub fn turn_seconds(&self, settings: &RoomSettings) -> u32 {
        settings
            .time_limit
            .unwrap_or_else(|| self.variant.default_turn_seconds())
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    /// Starts a round over `ring` (join order, late joiners included).
    ///
    /// `player_count` is the number of members, checked against the
    /// kind's minimum.
    pub fn start_round(
        &mut self,
        ring: Vec<ParticipantId>,
        player_count: usize,
        settings: &RoomSettings,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventKind>, RoomError> {
        if !matches!(self.phase, GamePhase::Idle | GamePhase::RoundEnded) {
            return Err(RoomError::InvalidTransition(format!(
                "cannot start a round from {:?}",
                self.phase
            )));
        }
        let needed = self.variant.min_players();
        if player_count < needed {
            return Err(RoomError::InsufficientPlayers {
                needed,
                have: player_count,
            });
        }
        if ring.is_empty() {
            return Err(RoomError::InsufficientPlayers { needed: 1, have: 0 });
        }

        // A card drawn right before the ring wrapped was never played;
        // it opens the next round instead of being discarded.
        let carry_over = self.phase == GamePhase::RoundEnded
            && self.prompt.is_some()
            && !self.prompt_played;
        if !carry_over {
            let state = if self.phase == GamePhase::Idle {
                self.variant.new_round_state(settings)
            } else {
                self.round_state.clone()
            };
            let draw = self.variant.next_prompt(&state);
            self.round_state = draw.state;
            self.set_prompt(draw.prompt);
        }

        self.ring = ring;
        self.round += 1;
        let mut events = vec![EventKind::RoundPromptChanged {
            round: self.round,
            prompt: self.prompt.clone(),
        }];

        if self.prompt.is_none() {
            events.extend(self.finish(None));
            return Ok(events);
        }

        self.holder_index = 0;
        let holder = self.ring[0].clone();
        let turn = self.open_turn(holder, settings, now);
        events.push(EventKind::TurnAdvanced {
            phase: GamePhase::RoundActive,
            turn: Some(turn),
            outcome: None,
        });
        Ok(events)
    }

    /// Applies the outcome of the current turn.
    pub fn advance(
        &mut self,
        outcome: Outcome,
        eligible: Eligible<'_>,
        settings: &RoomSettings,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventKind>, RoomError> {
        let holder = match (&self.turn, self.phase) {
            (Some(turn), GamePhase::RoundActive) => turn.holder.clone(),
            _ => {
                return Err(RoomError::InvalidTransition(format!(
                    "no active turn in {:?}",
                    self.phase
                )));
            }
        };

        let accepted = match &outcome {
            Outcome::Correct => true,
            Outcome::Answer { text } => {
                self.variant.is_answer_accepted(&self.round_state, text)
            }
            Outcome::TimedOut | Outcome::Skipped => false,
        };
        if !accepted {
            return Ok(self.rotate(outcome, false, eligible, settings, now));
        }

        let total = self.ledger.award(&holder, POINTS_PER_CORRECT);
        let mut events = vec![EventKind::ScoreAwarded {
            participant: holder.clone(),
            delta: POINTS_PER_CORRECT,
            total,
        }];
        if let Outcome::Answer { text } = &outcome {
            self.round_state = self.variant.record_answer(&self.round_state, text);
        }

        if settings.score_to_win.is_some_and(|goal| total >= goal) {
            events.extend(self.finish(Some(outcome)));
            return Ok(events);
        }

        let draw = self.variant.next_prompt(&self.round_state);
        self.round_state = draw.state;
        self.set_prompt(draw.prompt);
        events.push(EventKind::RoundPromptChanged {
            round: self.round,
            prompt: self.prompt.clone(),
        });
        if self.prompt.is_none() {
            events.extend(self.finish(Some(outcome)));
            return Ok(events);
        }

        if self.variant.rotates_on_correct() {
            events.extend(self.rotate(outcome, true, eligible, settings, now));
        } else {
            let turn = self.open_turn(holder, settings, now);
            events.push(EventKind::TurnAdvanced {
                phase: GamePhase::RoundActive,
                turn: Some(turn),
                outcome: Some(outcome),
            });
        }
        Ok(events)
    }

    /// The deadline for `turn_id` fired. `None` if that turn is no
    /// longer current.
    pub fn timeout(
        &mut self,
        turn_id: u64,
        eligible: Eligible<'_>,
        settings: &RoomSettings,
        now: DateTime<Utc>,
    ) -> Option<Vec<EventKind>> {
        if self.active_turn_id() != Some(turn_id) {
            return None;
        }
        self.advance(Outcome::TimedOut, eligible, settings, now).ok()
    }

    /// Ends the game early.
    pub fn end_game(&mut self) -> Result<Vec<EventKind>, RoomError> {
        match self.phase {
            GamePhase::RoundActive | GamePhase::RoundEnded => Ok(self.finish(None)),
            phase => Err(RoomError::InvalidTransition(format!(
                "cannot end the game from {phase:?}"
            ))),
        }
    }

    /// Reacts to a member leaving: an ineligible holder loses the turn,
    /// an ineligible pending holder is replaced.
    pub fn holder_departed(
        &mut self,
        eligible: Eligible<'_>,
        settings: &RoomSettings,
        now: DateTime<Utc>,
    ) -> Vec<EventKind> {
        let Some(turn) = &self.turn else {
            return Vec::new();
        };
        if eligible(&turn.holder) {
            return Vec::new();
        }
        match self.phase {
            GamePhase::RoundActive => {
                self.rotate(Outcome::Skipped, false, eligible, settings, now)
            }
            GamePhase::RoundEnded => self.end_round(None, eligible, now),
            _ => Vec::new(),
        }
    }

    /// Back to Idle with no scores, prompt, or turn.
    pub fn reset(&mut self) {
        self.phase = GamePhase::Idle;
        self.ring.clear();
        self.holder_index = 0;
        self.round = 0;
        self.turn = None;
        self.round_state = RoundState::default();
        self.prompt = None;
        self.prompt_played = false;
        self.ledger.clear();
        self.winners.clear();
    }

    // -----------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------

    /// Passes the turn along the ring.
    ///
    /// Landing back on the same holder finishes the game, except after a
    /// correct outcome where the lone holder simply keeps playing.
    /// Passing the end of the ring ends the round.
    fn rotate(
        &mut self,
        outcome: Outcome,
        after_correct: bool,
        eligible: Eligible<'_>,
        settings: &RoomSettings,
        now: DateTime<Utc>,
    ) -> Vec<EventKind> {
        let Some((next, wrapped)) = self.next_eligible(eligible) else {
            self.phase = GamePhase::RoundEnded;
            self.turn = None;
            return vec![EventKind::TurnAdvanced {
                phase: GamePhase::RoundEnded,
                turn: None,
                outcome: Some(outcome),
            }];
        };

        if next == self.holder_index {
            if !after_correct {
                return self.finish(Some(outcome));
            }
            let holder = self.ring[next].clone();
            let turn = self.open_turn(holder, settings, now);
            return vec![EventKind::TurnAdvanced {
                phase: GamePhase::RoundActive,
                turn: Some(turn),
                outcome: Some(outcome),
            }];
        }

        if wrapped {
            if settings.rounds_count.is_some_and(|rounds| self.round >= rounds) {
                return self.finish(Some(outcome));
            }
            return self.end_round(Some(outcome), eligible, now);
        }

        self.holder_index = next;
        let holder = self.ring[next].clone();
        let turn = self.open_turn(holder, settings, now);
        vec![EventKind::TurnAdvanced {
            phase: GamePhase::RoundActive,
            turn: Some(turn),
            outcome: Some(outcome),
        }]
    }

    /// The next eligible ring index after the holder, and whether
    /// reaching it passed the end of the ring.
    fn next_eligible(&self, eligible: Eligible<'_>) -> Option<(usize, bool)> {
        let len = self.ring.len();
        (1..=len)
            .map(|step| self.holder_index + step)
            .find_map(|raw| {
                let idx = raw % len;
                eligible(&self.ring[idx]).then_some((idx, raw >= len))
            })
    }

    /// Round over; the first eligible entry waits to open the next one.
    fn end_round(
        &mut self,
        outcome: Option<Outcome>,
        eligible: Eligible<'_>,
        now: DateTime<Utc>,
    ) -> Vec<EventKind> {
        self.phase = GamePhase::RoundEnded;
        self.turn = self.ring.iter().position(|p| eligible(p)).map(|idx| {
            self.holder_index = idx;
            self.last_turn_id += 1;
            TurnState {
                turn_id: self.last_turn_id,
                holder: self.ring[idx].clone(),
                round: self.round,
                started_at: now,
                deadline_at: None,
                status: TurnStatus::Waiting,
            }
        });
        vec![EventKind::TurnAdvanced {
            phase: GamePhase::RoundEnded,
            turn: self.turn.clone(),
            outcome,
        }]
    }

    fn open_turn(
        &mut self,
        holder: ParticipantId,
        settings: &RoomSettings,
        now: DateTime<Utc>,
    ) -> TurnState {
        let seconds = self.turn_seconds(settings);
        self.last_turn_id += 1;
        self.phase = GamePhase::RoundActive;
        self.prompt_played = true;
        let turn = TurnState {
            turn_id: self.last_turn_id,
            holder,
            round: self.round,
            started_at: now,
            deadline_at: Some(now + TimeDelta::seconds(i64::from(seconds))),
            status: TurnStatus::Active,
        };
        self.turn = Some(turn.clone());
        turn
    }

    fn set_prompt(&mut self, prompt: Option<String>) {
        self.prompt = prompt;
        self.prompt_played = false;
    }

    fn finish(&mut self, outcome: Option<Outcome>) -> Vec<EventKind> {
        self.phase = GamePhase::GameFinished;
        self.turn = None;
        self.winners = self.ledger.winners();
        vec![
            EventKind::TurnAdvanced {
                phase: GamePhase::GameFinished,
                turn: None,
                outcome,
            },
            EventKind::GameFinished {
                winners: self.winners.clone(),
            },
        ]
    }
}

// =========================================================================
// Tests
// =========================================================================
