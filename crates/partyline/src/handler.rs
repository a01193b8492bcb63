//! Per-connection handler: handshake, event forwarding, and command
//! dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `Hello` → check version, resume or issue an identity
//!   2. Send `Welcome` → player is connected
//!   3. Start the forwarder that pushes room events to the socket
//!   4. Loop: receive envelopes → heartbeat, goodbye, or command → reply

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use partyline_protocol::{
    ClientCommand, Codec, Envelope, ErrorCode, PROTOCOL_VERSION, Payload,
    Player, PlayerId, ProtocolError, Reply, ReplyBody, RoomEvent, RoomId,
    SystemMessage,
};
use partyline_room::{EventSender, NewRoom, RoomError};
use partyline_session::IdentityProvider;
use partyline_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::PartylineError;
use crate::server::ServerState;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// The sending half of a connection, shared with the event forwarder.
///
/// Owns the server-side `seq` counter so replies and pushed events are
/// numbered from one sequence.
struct Outbound {
    conn: Arc<WebSocketConnection>,
    seq: AtomicU64,
}

impl Outbound {
    async fn send<I: IdentityProvider, C: Codec>(
        &self,
        state: &ServerState<I, C>,
        payload: Payload,
    ) -> Result<(), PartylineError> {
        let envelope = Envelope {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            timestamp: state.now_ms(),
            payload,
        };
        let bytes = state.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn send_error<I: IdentityProvider, C: Codec>(
        &self,
        state: &ServerState<I, C>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Result<(), PartylineError> {
        self.send(
            state,
            Payload::System(SystemMessage::Error {
                code,
                message: message.into(),
            }),
        )
        .await
    }
}

/// Stops the forwarder and starts the player's grace period when the
/// handler exits, however it exits.
///
/// `Drop` is synchronous, so the session update runs on a spawned task.
struct ConnectionGuard<I: IdentityProvider, C: Codec> {
    conn_id: ConnectionId,
    forwarder: JoinHandle<()>,
    state: Arc<ServerState<I, C>>,
}

impl<I: IdentityProvider, C: Codec> Drop for ConnectionGuard<I, C> {
    fn drop(&mut self) {
        self.forwarder.abort();
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut sessions = state.sessions.lock().await;
            sessions.disconnect(conn_id);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<I, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<I, C>>,
) -> Result<(), PartylineError>
where
    I: IdentityProvider,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let out = Arc::new(Outbound {
        conn: Arc::new(conn),
        seq: AtomicU64::new(0),
    });

    // --- Step 1: Handshake ---
    let (mut player, resumed_rooms) = perform_handshake(&out, &state).await?;
    let player_id = player.id.clone();
    tracing::info!(%conn_id, %player_id, "player connected");

    // --- Step 2: Event forwarding ---
    let (events_tx, events_rx) =
        mpsc::channel(state.registry.config().subscriber_queue_size.max(1));
    let forwarder = tokio::spawn(forward_events(
        Arc::clone(&out),
        Arc::clone(&state),
        events_rx,
    ));
    let _guard = ConnectionGuard {
        conn_id,
        forwarder,
        state: Arc::clone(&state),
    };

    for room_id in resumed_rooms {
        match state
            .registry
            .subscribe(&room_id, &player_id, events_tx.clone())
            .await
        {
            Ok(_) => tracing::debug!(%player_id, %room_id, "resubscribed"),
            Err(e) => {
                tracing::debug!(%player_id, %room_id, error = %e, "room gone while away");
                state.sessions.lock().await.untrack_room(&player_id, &room_id);
            }
        }
    }

    // --- Step 3: Message loop ---
    loop {
        let data = match tokio::time::timeout(state.idle_timeout, out.conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%player_id, "connection timed out");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode envelope");
                out.send_error(&state, ErrorCode::BadRequest, e.to_string())
                    .await?;
                continue;
            }
        };

        match envelope.payload {
            Payload::System(SystemMessage::Heartbeat { client_time }) => {
                out.send(
                    &state,
                    Payload::System(SystemMessage::HeartbeatAck {
                        client_time,
                        server_time: state.now_ms(),
                    }),
                )
                .await?;
            }
            Payload::System(SystemMessage::Disconnect { reason }) => {
                tracing::info!(%player_id, %reason, "client said goodbye");
                break;
            }
            Payload::Command(command) => {
                let request_id = envelope.seq;
                let name = command.name();
                let reply = match dispatch(&state, &mut player, &events_tx, command).await {
                    Ok(body) => Reply::ok(request_id, body),
                    Err(e) => {
                        tracing::debug!(%player_id, command = name, error = %e, "command rejected");
                        Reply::rejected(request_id, e.code(), e.to_string())
                    }
                };
                out.send(&state, Payload::Reply(reply)).await?;
            }
            other => {
                tracing::debug!(%player_id, ?other, "unexpected payload from client");
                out.send_error(&state, ErrorCode::BadRequest, "unexpected message")
                    .await?;
            }
        }
    }

    // _guard drops here → forwarder stops, grace period starts.
    Ok(())
}

/// Receives `Hello`, binds an identity, and sends `Welcome`.
///
/// Returns the player and, for a resumed session, the rooms it still
/// belongs to.
async fn perform_handshake<I, C>(
    out: &Outbound,
    state: &ServerState<I, C>,
) -> Result<(Player, Vec<RoomId>), PartylineError>
where
    I: IdentityProvider,
    C: Codec,
{
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, out.conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let hello = match state.codec.decode::<Envelope>(&data).map(|env| env.payload) {
        Ok(Payload::System(SystemMessage::Hello {
            version,
            display_name,
            resume_token,
        })) => (version, display_name, resume_token),
        _ => {
            out.send_error(state, ErrorCode::BadRequest, "expected Hello")
                .await?;
            return Err(ProtocolError::InvalidMessage(
                "first message must be Hello".into(),
            )
            .into());
        }
    };
    let (version, display_name, resume_token) = hello;

    if version != PROTOCOL_VERSION {
        let err = ProtocolError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            got: version,
        };
        out.send_error(state, ErrorCode::VersionMismatch, err.to_string())
            .await?;
        return Err(err.into());
    }

    let conn_id = out.conn.id();
    let resumed = match resume_token {
        Some(token) => {
            let mut sessions = state.sessions.lock().await;
            match sessions.resume(&token, conn_id) {
                Ok(session) => Some((
                    session.player.clone(),
                    session.resume_token.clone(),
                    session.rooms.iter().cloned().collect::<Vec<_>>(),
                )),
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "resume failed, issuing new identity");
                    None
                }
            }
        }
        None => None,
    };

    let (player, resume_token, rooms) = match resumed {
        Some(resumed) => resumed,
        None => {
            let player = match state.identity.issue(&display_name).await {
                Ok(player) => player,
                Err(e) => {
                    let err = PartylineError::from(e);
                    out.send_error(state, err.code(), err.to_string()).await?;
                    return Err(err);
                }
            };
            let mut sessions = state.sessions.lock().await;
            let session = sessions.create(player, conn_id)?;
            (session.player.clone(), session.resume_token.clone(), Vec::new())
        }
    };

    out.send(
        state,
        Payload::System(SystemMessage::Welcome {
            player: player.clone(),
            resume_token,
            server_time: state.now_ms(),
        }),
    )
    .await?;

    Ok((player, rooms))
}

/// Pushes room events to the socket until the channel closes or a send
/// fails.
async fn forward_events<I, C>(
    out: Arc<Outbound>,
    state: Arc<ServerState<I, C>>,
    mut events: mpsc::Receiver<RoomEvent>,
) where
    I: IdentityProvider,
    C: Codec,
{
    while let Some(event) = events.recv().await {
        if let Err(e) = out.send(&state, Payload::Event(event)).await {
            tracing::debug!(conn_id = %out.conn.id(), error = %e, "event push failed");
            break;
        }
    }
}

/// Runs one command on behalf of `player`.
async fn dispatch<I, C>(
    state: &ServerState<I, C>,
    player: &mut Player,
    events: &EventSender,
    command: ClientCommand,
) -> Result<ReplyBody, PartylineError>
where
    I: IdentityProvider,
    C: Codec,
{
    let registry = &state.registry;
    let me = player.id.clone();

    let body = match command {
        ClientCommand::CreateRoom {
            name,
            game_kind,
            visibility,
            password,
            settings,
        } => {
            let spec = NewRoom {
                name,
                game_kind,
                visibility,
                password,
                settings,
            };
            let room_id = registry
                .create_room(spec, player.clone(), Some(events.clone()))
                .await?;
            track(state, &me, room_id.clone()).await;
            ReplyBody::RoomCreated { room_id }
        }
        ClientCommand::JoinRoom { room_id, password } => {
            let outcome = registry
                .join_room(&room_id, player.clone(), password, Some(events.clone()))
                .await?;
            track(state, &me, room_id).await;
            ReplyBody::Snapshot {
                snapshot: Box::new(outcome.snapshot),
            }
        }
        ClientCommand::LeaveRoom { room_id } => {
            match registry.leave_room(&room_id, &me).await {
                Ok(_) | Err(RoomError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
            state.sessions.lock().await.untrack_room(&me, &room_id);
            ReplyBody::Ack
        }
        ClientCommand::StartGame { room_id } => {
            registry.start_game(&room_id, &me).await?;
            ReplyBody::Ack
        }
        ClientCommand::SubmitOutcome {
            room_id,
            turn_id,
            outcome,
        } => {
            registry.submit_outcome(&room_id, &me, turn_id, outcome).await?;
            ReplyBody::Ack
        }
        ClientCommand::EndGame { room_id } => {
            registry.end_game(&room_id, &me).await?;
            ReplyBody::Ack
        }
        ClientCommand::ResetGame { room_id } => {
            registry.reset_game(&room_id, &me).await?;
            ReplyBody::Ack
        }
        ClientCommand::CreateTeam {
            room_id,
            name,
            color,
        } => {
            registry.create_team(&room_id, &me, name, color).await?;
            ReplyBody::Ack
        }
        ClientCommand::JoinTeam { room_id, team_id } => {
            registry.join_team(&room_id, &me, &team_id).await?;
            ReplyBody::Ack
        }
        ClientCommand::ListRooms { filter } => ReplyBody::RoomList {
            rooms: registry.list_rooms(&filter).await.to_vec(),
        },
        ClientCommand::Resync { room_id } => ReplyBody::Snapshot {
            snapshot: Box::new(registry.resync(&room_id, &me).await?),
        },
        ClientCommand::Rename { display_name } => {
            let (renamed, rooms) = {
                let mut sessions = state.sessions.lock().await;
                let renamed = sessions.rename(&me, &display_name)?.clone();
                let rooms: Vec<RoomId> = sessions
                    .get(&me)
                    .map(|s| s.rooms.iter().cloned().collect())
                    .unwrap_or_default();
                (renamed, rooms)
            };
            for room_id in rooms {
                if let Err(e) = registry
                    .rename(&room_id, &me, renamed.display_name.clone())
                    .await
                {
                    tracing::debug!(player_id = %me, %room_id, error = %e, "rename not applied");
                }
            }
            *player = renamed.clone();
            ReplyBody::Renamed { player: renamed }
        }
    };

    Ok(body)
}

async fn track<I: IdentityProvider, C: Codec>(
    state: &ServerState<I, C>,
    player_id: &PlayerId,
    room_id: RoomId,
) {
    state.sessions.lock().await.track_room(player_id, room_id);
}
