//! Room actor: one Tokio task per room, the room's only writer.
//!
//! Commands arrive on a bounded mpsc queue and are applied one at a
//! time. Each accepted command commits its events in one step: append
//! to the log, fan out to subscribers, save the snapshot. The turn
//! deadline is raced against the queue in the same `select!`, so a
//! timeout and a submission for the same turn are serialized here too.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use partyline_deadline::{DeadlineExpired, DeadlineTimer};
use partyline_protocol::{
    EventKind, GamePhase, Outcome, ParticipantId, Player, PlayerId, RoomEvent,
    RoomId, RoomSnapshot, RoomStatus, RoomSummary, Team, TeamId,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::replication::{EventLog, EventSender, Subscribers};
use crate::room::{JoinCheck, Room};
use crate::{RegistryConfig, RoomError, SnapshotStore, TurnEngine, verify_password};

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Result of a join request.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// Room state including the joiner.
    pub snapshot: RoomSnapshot,
    /// `false` when the player was already a member.
    pub joined: bool,
}

/// Result of a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// `false` when the player was not a member.
    pub left: bool,
    /// The room emptied and shut down.
    pub destroyed: bool,
}

/// Commands sent to a room actor through its queue.
pub(crate) enum RoomCommand {
    /// The room's password hash, if it is private.
    PasswordHash {
        reply: Reply<Option<String>>,
    },
    /// `password_ok` was settled against the room's hash off the room
    /// task.
    Join {
        player: Player,
        password_ok: bool,
        subscriber: Option<EventSender>,
        reply: Reply<JoinOutcome>,
    },
    Leave {
        player_id: PlayerId,
        reply: Reply<LeaveOutcome>,
    },
    /// Reattach a member's event queue, e.g. after a reconnect.
    Subscribe {
        player_id: PlayerId,
        subscriber: EventSender,
        reply: Reply<RoomSnapshot>,
    },
    Unsubscribe {
        player_id: PlayerId,
    },
    UpdateStatus {
        status: RoomStatus,
        reply: Reply<()>,
    },
    StartGame {
        actor: PlayerId,
        reply: Reply<()>,
    },
    SubmitOutcome {
        actor: PlayerId,
        turn_id: u64,
        outcome: Outcome,
        reply: Reply<()>,
    },
    EndGame {
        actor: PlayerId,
        reply: Reply<()>,
    },
    ResetGame {
        actor: PlayerId,
        reply: Reply<()>,
    },
    CreateTeam {
        actor: PlayerId,
        name: String,
        color: String,
        reply: Reply<Team>,
    },
    JoinTeam {
        actor: PlayerId,
        team_id: TeamId,
        reply: Reply<()>,
    },
    Rename {
        player_id: PlayerId,
        display_name: String,
        reply: Reply<()>,
    },
    Snapshot {
        reply: Reply<RoomSnapshot>,
    },
    Summary {
        reply: Reply<RoomSummary>,
    },
    EventsSince {
        after: u64,
        reply: Reply<Vec<RoomEvent>>,
    },
    Shutdown,
}

impl std::fmt::Debug for RoomCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::PasswordHash { .. } => "PasswordHash",
            Self::Join { .. } => "Join",
            Self::Leave { .. } => "Leave",
            Self::Subscribe { .. } => "Subscribe",
            Self::Unsubscribe { .. } => "Unsubscribe",
            Self::UpdateStatus { .. } => "UpdateStatus",
            Self::StartGame { .. } => "StartGame",
            Self::SubmitOutcome { .. } => "SubmitOutcome",
            Self::EndGame { .. } => "EndGame",
            Self::ResetGame { .. } => "ResetGame",
            Self::CreateTeam { .. } => "CreateTeam",
            Self::JoinTeam { .. } => "JoinTeam",
            Self::Rename { .. } => "Rename",
            Self::Snapshot { .. } => "Snapshot",
            Self::Summary { .. } => "Summary",
            Self::EventsSince { .. } => "EventsSince",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// RoomHandle
// ---------------------------------------------------------------------------

/// Handle to a running room actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether both handles drive the same actor.
    pub fn same_room_task(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    /// Sends a command and waits for its reply.
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?
    }

    pub async fn join(
        &self,
        player: Player,
        password: Option<String>,
        subscriber: Option<EventSender>,
    ) -> Result<JoinOutcome, RoomError> {
        // Argon2 is slow on purpose; it runs on the blocking pool so the
        // room keeps serving its queue meanwhile. The hash never changes
        // for the life of a room.
        let hash = self
            .request(|reply| RoomCommand::PasswordHash { reply })
            .await?;
        let password_ok = match (hash, password) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(hash), Some(given)) => {
                tokio::task::spawn_blocking(move || verify_password(&given, &hash))
                    .await
                    .map_err(|e| RoomError::PasswordHash(e.to_string()))?
            }
        };
        self.request(|reply| RoomCommand::Join {
            player,
            password_ok,
            subscriber,
            reply,
        })
        .await
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<LeaveOutcome, RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await
    }

    pub async fn subscribe(
        &self,
        player_id: PlayerId,
        subscriber: EventSender,
    ) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Subscribe {
            player_id,
            subscriber,
            reply,
        })
        .await
    }

    /// Fire-and-forget.
    pub async fn unsubscribe(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Unsubscribe { player_id })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    pub async fn update_status(&self, status: RoomStatus) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::UpdateStatus { status, reply })
            .await
    }

    pub async fn start_game(&self, actor: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::StartGame { actor, reply })
            .await
    }

    pub async fn submit_outcome(
        &self,
        actor: PlayerId,
        turn_id: u64,
        outcome: Outcome,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::SubmitOutcome {
            actor,
            turn_id,
            outcome,
            reply,
        })
        .await
    }

    pub async fn end_game(&self, actor: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::EndGame { actor, reply })
            .await
    }

    pub async fn reset_game(&self, actor: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::ResetGame { actor, reply })
            .await
    }

    pub async fn create_team(
        &self,
        actor: PlayerId,
        name: String,
        color: String,
    ) -> Result<Team, RoomError> {
        self.request(|reply| RoomCommand::CreateTeam {
            actor,
            name,
            color,
            reply,
        })
        .await
    }

    pub async fn join_team(&self, actor: PlayerId, team_id: TeamId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::JoinTeam {
            actor,
            team_id,
            reply,
        })
        .await
    }

    pub async fn rename(
        &self,
        player_id: PlayerId,
        display_name: String,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Rename {
            player_id,
            display_name,
            reply,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    pub async fn summary(&self) -> Result<RoomSummary, RoomError> {
        self.request(|reply| RoomCommand::Summary { reply }).await
    }

    /// Retained events after `after`, for catching up without a full
    /// snapshot.
    pub async fn events_since(&self, after: u64) -> Result<Vec<RoomEvent>, RoomError> {
        self.request(|reply| RoomCommand::EventsSince { after, reply })
            .await
    }

    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }
}

// ---------------------------------------------------------------------------
// RoomActor
// ---------------------------------------------------------------------------

struct RoomActor {
    room: Room,
    engine: TurnEngine,
    log: EventLog,
    subscribers: Subscribers,
    timer: DeadlineTimer,
    store: Arc<dyn SnapshotStore>,
    receiver: mpsc::Receiver<RoomCommand>,
}

enum Wake {
    Command(RoomCommand),
    Deadline(DeadlineExpired),
    Closed,
}

impl RoomActor {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room.id, kind = %self.room.game_kind, "room actor started");

        loop {
            let wake = tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => Wake::Command(cmd),
                    None => Wake::Closed,
                },
                expired = self.timer.wait_for_deadline() => Wake::Deadline(expired),
            };

            let flow = match wake {
                Wake::Command(cmd) => self.handle(cmd),
                Wake::Deadline(expired) => {
                    self.apply_timeout(expired.turn_id);
                    ControlFlow::Continue(())
                }
                Wake::Closed => ControlFlow::Break(()),
            };
            if flow.is_break() {
                break;
            }
            self.sync_deadline();
        }

        tracing::info!(room_id = %self.room.id, "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::PasswordHash { reply } => {
                let _ = reply.send(Ok(self.room.password_hash().map(str::to_owned)));
            }
            RoomCommand::Join {
                player,
                password_ok,
                subscriber,
                reply,
            } => {
                let _ = reply.send(self.handle_join(player, password_ok, subscriber));
            }
            RoomCommand::Leave { player_id, reply } => {
                let outcome = self.handle_leave(&player_id);
                let _ = reply.send(Ok(outcome));
                if outcome.destroyed {
                    return ControlFlow::Break(());
                }
            }
            RoomCommand::Subscribe {
                player_id,
                subscriber,
                reply,
            } => {
                let result = if self.room.is_member(&player_id) {
                    self.subscribers.subscribe(player_id, subscriber);
                    Ok(self.snapshot())
                } else {
                    Err(RoomError::NotMember(player_id, self.room.id.clone()))
                };
                let _ = reply.send(result);
            }
            RoomCommand::Unsubscribe { player_id } => {
                self.subscribers.unsubscribe(&player_id);
            }
            RoomCommand::UpdateStatus { status, reply } => {
                let _ = reply.send(self.handle_update_status(status));
            }
            RoomCommand::StartGame { actor, reply } => {
                let _ = reply.send(self.handle_start(&actor));
            }
            RoomCommand::SubmitOutcome {
                actor,
                turn_id,
                outcome,
                reply,
            } => {
                let _ = reply.send(self.handle_submit(actor, turn_id, outcome));
            }
            RoomCommand::EndGame { actor, reply } => {
                let _ = reply.send(self.handle_end(&actor));
            }
            RoomCommand::ResetGame { actor, reply } => {
                let _ = reply.send(self.handle_reset(&actor));
            }
            RoomCommand::CreateTeam {
                actor,
                name,
                color,
                reply,
            } => {
                let _ = reply.send(self.handle_create_team(&actor, &name, &color));
            }
            RoomCommand::JoinTeam {
                actor,
                team_id,
                reply,
            } => {
                let _ = reply.send(self.handle_join_team(actor, team_id));
            }
            RoomCommand::Rename {
                player_id,
                display_name,
                reply,
            } => {
                let _ = reply.send(self.handle_rename(player_id, display_name));
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.snapshot()));
            }
            RoomCommand::Summary { reply } => {
                let _ = reply.send(Ok(self.room.summary()));
            }
            RoomCommand::EventsSince { after, reply } => {
                let _ = reply.send(Ok(self.log.since(after)));
            }
            RoomCommand::Shutdown => {
                tracing::info!(room_id = %self.room.id, "room shutting down");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // -----------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------

    fn handle_join(
        &mut self,
        player: Player,
        password_ok: bool,
        subscriber: Option<EventSender>,
    ) -> Result<JoinOutcome, RoomError> {
        let check = self.room.check_join(&player.id, password_ok)?;
        if let Some(subscriber) = subscriber {
            self.subscribers.subscribe(player.id.clone(), subscriber);
        }
        if check == JoinCheck::AlreadyMember {
            return Ok(JoinOutcome {
                snapshot: self.snapshot(),
                joined: false,
            });
        }

        tracing::info!(
            room_id = %self.room.id,
            player_id = %player.id,
            players = self.room.members().len() + 1,
            "player joined"
        );
        self.room.add_member(player.clone());
        self.commit(vec![EventKind::PlayerJoined { player }]);
        Ok(JoinOutcome {
            snapshot: self.snapshot(),
            joined: true,
        })
    }

    fn handle_leave(&mut self, player_id: &PlayerId) -> LeaveOutcome {
        let Some(new_host) = self.room.remove_member(player_id) else {
            return LeaveOutcome {
                left: false,
                destroyed: false,
            };
        };
        self.subscribers.unsubscribe(player_id);
        tracing::info!(
            room_id = %self.room.id,
            %player_id,
            players = self.room.members().len(),
            "player left"
        );

        let mut events = vec![EventKind::PlayerLeft {
            player_id: player_id.clone(),
            new_host,
        }];

        if self.room.members().is_empty() {
            events.push(EventKind::RoomDestroyed);
            self.commit(events);
            self.timer.cancel();
            self.store.remove(&self.room.id);
            tracing::info!(room_id = %self.room.id, "room emptied, destroying");
            return LeaveOutcome {
                left: true,
                destroyed: true,
            };
        }

        let now = Utc::now();
        let room = &self.room;
        let eligible = |p: &ParticipantId| room.is_eligible(p);
        let moved = self.engine.holder_departed(&eligible, &room.settings, now);
        events.extend(self.after_engine(moved));
        self.commit(events);
        LeaveOutcome {
            left: true,
            destroyed: false,
        }
    }

    fn handle_rename(
        &mut self,
        player_id: PlayerId,
        display_name: String,
    ) -> Result<(), RoomError> {
        if !self.room.rename_member(&player_id, &display_name) {
            return Err(RoomError::NotMember(player_id, self.room.id.clone()));
        }
        self.commit(vec![EventKind::PlayerRenamed {
            player_id,
            display_name,
        }]);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Status and game flow
    // -----------------------------------------------------------------

    fn handle_update_status(&mut self, status: RoomStatus) -> Result<(), RoomError> {
        if !self.room.status.can_transition_to(status) {
            return Err(RoomError::InvalidTransition(format!(
                "room cannot go from {:?} to {status:?}",
                self.room.status
            )));
        }
        if status == RoomStatus::Finished
            && matches!(
                self.engine.phase(),
                GamePhase::RoundActive | GamePhase::RoundEnded
            )
        {
            let events = self.engine.end_game()?;
            let events = self.after_engine(events);
            self.commit(events);
            return Ok(());
        }
        self.room.status = status;
        self.commit(vec![EventKind::StatusChanged { status }]);
        Ok(())
    }

    fn handle_start(&mut self, actor: &PlayerId) -> Result<(), RoomError> {
        self.require_host(actor)?;
        if self.room.status == RoomStatus::Finished {
            return Err(RoomError::InvalidTransition(
                "the game is over; reset the room first".into(),
            ));
        }

        let ring = self.room.ring();
        let player_count = self.room.members().len();
        let started = self.engine.start_round(
            ring,
            player_count,
            &self.room.settings,
            Utc::now(),
        )?;

        let mut events = Vec::new();
        if self.room.status == RoomStatus::Waiting {
            self.room.status = RoomStatus::Playing;
            events.push(EventKind::StatusChanged {
                status: RoomStatus::Playing,
            });
        }
        tracing::info!(
            room_id = %self.room.id,
            round = self.engine.round(),
            "round started"
        );
        events.extend(self.after_engine(started));
        self.commit(events);
        Ok(())
    }

    fn handle_submit(
        &mut self,
        actor: PlayerId,
        turn_id: u64,
        outcome: Outcome,
    ) -> Result<(), RoomError> {
        if !self.room.is_member(&actor) {
            return Err(RoomError::NotMember(actor, self.room.id.clone()));
        }

        // A deadline that passed while this command sat in the queue
        // wins over the submission.
        if self.timer.has_passed(Instant::now()) {
            if let Some(expired) = self.timer.armed_turn() {
                self.timer.cancel();
                self.apply_timeout(expired);
            }
        }

        if self.engine.active_turn_id() != Some(turn_id) {
            return Err(RoomError::StaleTurn { submitted: turn_id });
        }
        let Some(holder) = self.engine.turn().map(|t| t.holder.clone()) else {
            return Err(RoomError::StaleTurn { submitted: turn_id });
        };
        // The host referees every turn, not only its own.
        if !self.room.is_host(&actor) && !self.room.acts_for(&actor, &holder) {
            return Err(RoomError::NotYourTurn(actor));
        }

        let now = Utc::now();
        let room = &self.room;
        let eligible = |p: &ParticipantId| room.is_eligible(p);
        let advanced = self
            .engine
            .advance(outcome, &eligible, &room.settings, now)?;
        let events = self.after_engine(advanced);
        self.commit(events);
        Ok(())
    }

    fn apply_timeout(&mut self, turn_id: u64) {
        let now = Utc::now();
        let room = &self.room;
        let eligible = |p: &ParticipantId| room.is_eligible(p);
        let Some(events) = self.engine.timeout(turn_id, &eligible, &room.settings, now) else {
            return;
        };
        tracing::info!(room_id = %self.room.id, turn_id, "turn timed out");
        let events = self.after_engine(events);
        self.commit(events);
    }

    fn handle_end(&mut self, actor: &PlayerId) -> Result<(), RoomError> {
        self.require_host(actor)?;
        let ended = self.engine.end_game()?;
        let events = self.after_engine(ended);
        self.commit(events);
        Ok(())
    }

    fn handle_reset(&mut self, actor: &PlayerId) -> Result<(), RoomError> {
        self.require_host(actor)?;
        if self.room.status == RoomStatus::Waiting {
            return Err(RoomError::InvalidTransition(
                "nothing to reset while waiting".into(),
            ));
        }
        self.engine.reset();
        self.room.status = RoomStatus::Waiting;
        self.room.reset_team_scores();
        tracing::info!(room_id = %self.room.id, "game reset");
        self.commit(vec![EventKind::GameReset]);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Teams
    // -----------------------------------------------------------------

    fn handle_create_team(
        &mut self,
        actor: &PlayerId,
        name: &str,
        color: &str,
    ) -> Result<Team, RoomError> {
        self.require_host(actor)?;
        if !self.engine.variant().supports_teams() {
            return Err(RoomError::Validation(format!(
                "{} has no teams",
                self.room.game_kind
            )));
        }
        if self.room.status != RoomStatus::Waiting {
            return Err(RoomError::InvalidTransition(
                "teams can only be created before the game".into(),
            ));
        }
        if name.trim().is_empty() {
            return Err(RoomError::Validation("team name must not be blank".into()));
        }
        let team = self.room.create_team(name, color);
        self.commit(vec![EventKind::TeamCreated { team: team.clone() }]);
        Ok(team)
    }

    fn handle_join_team(&mut self, actor: PlayerId, team_id: TeamId) -> Result<(), RoomError> {
        if !self.room.is_member(&actor) {
            return Err(RoomError::NotMember(actor, self.room.id.clone()));
        }
        let Some(team) = self.room.team(&team_id) else {
            return Err(RoomError::Validation(format!("no team {team_id}")));
        };
        if team.has_member(&actor) {
            return Ok(());
        }
        self.room.join_team(&team_id, &actor);

        let mut events = vec![EventKind::TeamJoined {
            team_id,
            player_id: actor,
        }];
        let now = Utc::now();
        let room = &self.room;
        let eligible = |p: &ParticipantId| room.is_eligible(p);
        let moved = self.engine.holder_departed(&eligible, &room.settings, now);
        events.extend(self.after_engine(moved));
        self.commit(events);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    fn require_host(&self, actor: &PlayerId) -> Result<(), RoomError> {
        if !self.room.is_member(actor) {
            return Err(RoomError::NotMember(actor.clone(), self.room.id.clone()));
        }
        if !self.room.is_host(actor) {
            return Err(RoomError::NotHost(actor.clone()));
        }
        Ok(())
    }

    /// Mirrors engine results into the room record: team scores, and
    /// the Finished status once the game is over.
    fn after_engine(&mut self, mut events: Vec<EventKind>) -> Vec<EventKind> {
        for event in &events {
            if let EventKind::ScoreAwarded {
                participant: ParticipantId::Team(team_id),
                total,
                ..
            } = event
            {
                self.room.set_team_score(team_id, *total);
            }
        }
        if self.engine.phase() == GamePhase::GameFinished
            && self.room.status != RoomStatus::Finished
        {
            self.room.status = RoomStatus::Finished;
            events.push(EventKind::StatusChanged {
                status: RoomStatus::Finished,
            });
            tracing::info!(
                room_id = %self.room.id,
                winners = self.engine.winners().len(),
                "game finished"
            );
        }
        events
    }

    /// Appends, broadcasts, and persists, in that order.
    fn commit(&mut self, events: Vec<EventKind>) {
        if events.is_empty() {
            return;
        }
        for kind in events {
            let event = self.log.append(kind);
            tracing::debug!(
                room_id = %self.room.id,
                sequence = event.sequence,
                kind = event.kind.name(),
                "event committed"
            );
            self.subscribers.broadcast(&event);
        }
        self.store.save(&self.snapshot());
    }

    /// Keeps the timer armed for exactly the active turn.
    fn sync_deadline(&mut self) {
        match self.engine.active_turn_id() {
            Some(turn_id) if self.timer.armed_turn() != Some(turn_id) => {
                let secs = self.engine.turn_seconds(&self.room.settings);
                self.timer.arm(turn_id, Duration::from_secs(u64::from(secs)));
            }
            Some(_) => {}
            None => self.timer.cancel(),
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        self.room.snapshot(&self.engine, self.log.last_sequence())
    }
}

/// Spawns the actor for a freshly created room.
///
/// The room's first event, `RoomCreated`, is committed before the task
/// starts, so every subscriber and the store see sequence 1 first.
pub(crate) fn spawn_room(
    room: Room,
    engine: TurnEngine,
    host_subscriber: Option<EventSender>,
    store: Arc<dyn SnapshotStore>,
    config: &RegistryConfig,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.command_channel_size);
    let room_id = room.id.clone();

    let mut subscribers = Subscribers::new(room_id.clone());
    if let Some(sender) = host_subscriber {
        subscribers.subscribe(room.host.clone(), sender);
    }

    let mut actor = RoomActor {
        log: EventLog::new(room_id.clone(), config.event_log_capacity),
        subscribers,
        timer: DeadlineTimer::new(),
        store,
        receiver: rx,
        room,
        engine,
    };
    let initial = actor.snapshot();
    actor.commit(vec![EventKind::RoomCreated {
        snapshot: Box::new(initial),
    }]);

    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}
