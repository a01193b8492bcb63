//! Integration tests for the Partyline server, handler, and full
//! connection flow.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use partyline::prelude::*;
use tokio_tungstenite::tungstenite::Message;

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

// =========================================================================
// Helpers
// =========================================================================

/// Starts a server on a random port and returns its address.
async fn start_server() -> String {
    start_server_with(SessionConfig::default()).await
}

async fn start_server_with(session_config: SessionConfig) -> String {
    let server = PartylineServer::builder()
        .bind("127.0.0.1:0")
        .session_config(session_config)
        .build(AnonymousIdentity)
        .await
        .expect("server should bind");
    let addr = server.local_addr().expect("bound address");
    tokio::spawn(server.run());
    format!("ws://{addr}")
}

/// A test client that numbers its envelopes and buffers pushed events
/// while waiting for replies.
struct Client {
    ws: ClientWs,
    seq: u64,
    events: Vec<RoomEvent>,
}

impl Client {
    async fn connect(url: &str) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .expect("client should connect");
        Self {
            ws,
            seq: 0,
            events: Vec::new(),
        }
    }

    /// Connects and completes the handshake.
    async fn join(url: &str, name: &str) -> (Self, Player, String) {
        let mut client = Self::connect(url).await;
        client.hello(PROTOCOL_VERSION, name, None).await;
        match client.recv_system().await {
            SystemMessage::Welcome {
                player,
                resume_token,
                ..
            } => (client, player, resume_token),
            other => panic!("expected Welcome, got {other:?}"),
        }
    }

    async fn send(&mut self, payload: Payload) -> u64 {
        self.seq += 1;
        let envelope = Envelope {
            seq: self.seq,
            timestamp: 0,
            payload,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        self.ws.send(Message::text(json)).await.unwrap();
        self.seq
    }

    async fn hello(&mut self, version: u32, name: &str, resume_token: Option<String>) {
        self.send(Payload::System(SystemMessage::Hello {
            version,
            display_name: name.into(),
            resume_token,
        }))
        .await;
    }

    async fn recv(&mut self) -> Envelope {
        let msg = tokio::time::timeout(Duration::from_secs(5), self.ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        serde_json::from_slice(&msg.into_data()).expect("server sent valid JSON")
    }

    async fn recv_system(&mut self) -> SystemMessage {
        loop {
            match self.recv().await.payload {
                Payload::System(msg) => return msg,
                Payload::Event(event) => self.events.push(event),
                other => panic!("expected a system message, got {other:?}"),
            }
        }
    }

    /// Sends a command and waits for its reply, buffering events.
    async fn command(&mut self, command: ClientCommand) -> Reply {
        let request_id = self.send(Payload::Command(command)).await;
        loop {
            match self.recv().await.payload {
                Payload::Reply(reply) if reply.request_id == request_id => return reply,
                Payload::Event(event) => self.events.push(event),
                other => panic!("expected reply {request_id}, got {other:?}"),
            }
        }
    }

    async fn ok(&mut self, command: ClientCommand) -> ReplyBody {
        match self.command(command).await.result {
            ReplyResult::Ok(body) => body,
            ReplyResult::Rejected(r) => panic!("rejected: {} {}", r.code, r.message),
        }
    }

    async fn rejected(&mut self, command: ClientCommand) -> ErrorCode {
        match self.command(command).await.result {
            ReplyResult::Rejected(r) => r.code,
            ReplyResult::Ok(body) => panic!("expected rejection, got {body:?}"),
        }
    }

    /// Waits for the next event matching `pred`.
    async fn event_where(&mut self, pred: impl Fn(&EventKind) -> bool) -> RoomEvent {
        if let Some(pos) = self.events.iter().position(|e| pred(&e.kind)) {
            return self.events.remove(pos);
        }
        loop {
            match self.recv().await.payload {
                Payload::Event(event) if pred(&event.kind) => return event,
                Payload::Event(event) => self.events.push(event),
                other => panic!("expected an event, got {other:?}"),
            }
        }
    }
}

fn create_public(name: &str) -> ClientCommand {
    ClientCommand::CreateRoom {
        name: name.into(),
        game_kind: GameKind::Trivia,
        visibility: Visibility::Public,
        password: None,
        settings: RoomSettings::default(),
    }
}

async fn create_room(client: &mut Client, command: ClientCommand) -> RoomId {
    match client.ok(command).await {
        ReplyBody::RoomCreated { room_id } => room_id,
        other => panic!("expected RoomCreated, got {other:?}"),
    }
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_handshake_welcome_issues_identity() {
    let url = start_server().await;
    let (_client, player, token) = Client::join(&url, "  Ana ").await;

    assert_eq!(player.display_name, "Ana");
    assert!(!player.id.as_str().is_empty());
    assert_eq!(token.len(), 32);
}

#[tokio::test]
async fn test_handshake_version_mismatch_returns_error() {
    let url = start_server().await;
    let mut client = Client::connect(&url).await;

    client.hello(PROTOCOL_VERSION + 1, "Ana", None).await;

    match client.recv_system().await {
        SystemMessage::Error { code, .. } => assert_eq!(code, ErrorCode::VersionMismatch),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_requires_hello_first() {
    let url = start_server().await;
    let mut client = Client::connect(&url).await;

    client
        .send(Payload::System(SystemMessage::Heartbeat { client_time: 1 }))
        .await;

    match client.recv_system().await {
        SystemMessage::Error { code, .. } => assert_eq!(code, ErrorCode::BadRequest),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_blank_name_returns_validation_error() {
    let url = start_server().await;
    let mut client = Client::connect(&url).await;

    client.hello(PROTOCOL_VERSION, "   ", None).await;

    match client.recv_system().await {
        SystemMessage::Error { code, .. } => assert_eq!(code, ErrorCode::ValidationError),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resume_token_keeps_identity_and_rooms() {
    let url = start_server().await;
    let (mut ana, player, token) = Client::join(&url, "Ana").await;
    let room_id = create_room(&mut ana, create_public("Lobby")).await;

    ana.ws.close(None).await.unwrap();
    drop(ana);
    // Let the server notice the drop before resuming.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut back = Client::connect(&url).await;
    back.hello(PROTOCOL_VERSION, "Ana", Some(token)).await;
    let resumed = match back.recv_system().await {
        SystemMessage::Welcome { player, .. } => player,
        other => panic!("expected Welcome, got {other:?}"),
    };
    assert_eq!(resumed.id, player.id);

    match back.ok(ClientCommand::Resync { room_id }).await {
        ReplyBody::Snapshot { snapshot } => assert!(snapshot.is_member(&player.id)),
        other => panic!("expected Snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_resume_token_issues_fresh_identity() {
    let url = start_server().await;
    let mut client = Client::connect(&url).await;

    client
        .hello(PROTOCOL_VERSION, "Bo", Some("f".repeat(32)))
        .await;

    match client.recv_system().await {
        SystemMessage::Welcome { player, .. } => assert_eq!(player.display_name, "Bo"),
        other => panic!("expected Welcome, got {other:?}"),
    }
}

// =========================================================================
// Connection plumbing
// =========================================================================

#[tokio::test]
async fn test_heartbeat_gets_ack_with_client_time() {
    let url = start_server().await;
    let (mut client, _, _) = Client::join(&url, "Ana").await;

    client
        .send(Payload::System(SystemMessage::Heartbeat { client_time: 4242 }))
        .await;

    match client.recv_system().await {
        SystemMessage::HeartbeatAck { client_time, .. } => assert_eq!(client_time, 4242),
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_frame_gets_error_and_connection_survives() {
    let url = start_server().await;
    let (mut client, _, _) = Client::join(&url, "Ana").await;

    client
        .ws
        .send(Message::text("{ not json"))
        .await
        .unwrap();
    match client.recv_system().await {
        SystemMessage::Error { code, .. } => assert_eq!(code, ErrorCode::BadRequest),
        other => panic!("expected Error, got {other:?}"),
    }

    // Still usable.
    match client.ok(ClientCommand::ListRooms {
        filter: RoomFilter::default(),
    })
    .await
    {
        ReplyBody::RoomList { .. } => {}
        other => panic!("expected RoomList, got {other:?}"),
    }
}

#[tokio::test]
async fn test_idle_connection_is_dropped() {
    let url = start_server_with(SessionConfig {
        idle_timeout_secs: 1,
        ..SessionConfig::default()
    })
    .await;
    let (mut client, _, _) = Client::join(&url, "Ana").await;

    let next = tokio::time::timeout(Duration::from_secs(5), client.ws.next())
        .await
        .expect("server should close the idle connection");
    assert!(matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
}

// =========================================================================
// Rooms over the wire
// =========================================================================

#[tokio::test]
async fn test_create_and_join_pushes_events() {
    let url = start_server().await;
    let (mut ana, ana_player, _) = Client::join(&url, "Ana").await;
    let (mut bo, bo_player, _) = Client::join(&url, "Bo").await;

    let room_id = create_room(&mut ana, create_public("Trivia Night")).await;
    let created = ana
        .event_where(|k| matches!(k, EventKind::RoomCreated { .. }))
        .await;
    assert_eq!(created.sequence, 1);

    let snapshot = match bo
        .ok(ClientCommand::JoinRoom {
            room_id: room_id.clone(),
            password: None,
        })
        .await
    {
        ReplyBody::Snapshot { snapshot } => snapshot,
        other => panic!("expected Snapshot, got {other:?}"),
    };
    assert_eq!(snapshot.members.len(), 2);
    assert_eq!(snapshot.host_player_id, ana_player.id);

    let joined = ana
        .event_where(|k| matches!(k, EventKind::PlayerJoined { .. }))
        .await;
    assert_eq!(joined.sequence, 2);
    match joined.kind {
        EventKind::PlayerJoined { player } => assert_eq!(player.id, bo_player.id),
        other => panic!("expected PlayerJoined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_private_room_wrong_password_rejected() {
    let url = start_server().await;
    let (mut ana, _, _) = Client::join(&url, "Ana").await;
    let (mut bo, _, _) = Client::join(&url, "Bo").await;

    let room_id = create_room(
        &mut ana,
        ClientCommand::CreateRoom {
            name: "Secret".into(),
            game_kind: GameKind::Alias,
            visibility: Visibility::Private,
            password: Some("hunter2".into()),
            settings: RoomSettings::default(),
        },
    )
    .await;

    let code = bo
        .rejected(ClientCommand::JoinRoom {
            room_id: room_id.clone(),
            password: Some("guess".into()),
        })
        .await;
    assert_eq!(code, ErrorCode::WrongPassword);

    match bo
        .ok(ClientCommand::JoinRoom {
            room_id,
            password: Some("hunter2".into()),
        })
        .await
    {
        ReplyBody::Snapshot { snapshot } => assert_eq!(snapshot.members.len(), 2),
        other => panic!("expected Snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_unknown_room_returns_not_found() {
    let url = start_server().await;
    let (mut bo, _, _) = Client::join(&url, "Bo").await;

    let code = bo
        .rejected(ClientCommand::JoinRoom {
            room_id: RoomId::new("ZZZZZZ"),
            password: None,
        })
        .await;
    assert_eq!(code, ErrorCode::NotFound);
}

#[tokio::test]
async fn test_resync_returns_current_snapshot() {
    let url = start_server().await;
    let (mut ana, _, _) = Client::join(&url, "Ana").await;
    let (mut bo, _, _) = Client::join(&url, "Bo").await;
    let room_id = create_room(&mut ana, create_public("Lobby")).await;
    bo.ok(ClientCommand::JoinRoom {
        room_id: room_id.clone(),
        password: None,
    })
    .await;

    match ana
        .ok(ClientCommand::Resync {
            room_id: room_id.clone(),
        })
        .await
    {
        ReplyBody::Snapshot { snapshot } => {
            assert_eq!(snapshot.members.len(), 2);
            assert_eq!(snapshot.sequence, 2);
        }
        other => panic!("expected Snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resync_by_non_member_rejected() {
    let url = start_server().await;
    let (mut ana, _, _) = Client::join(&url, "Ana").await;
    let (mut eve, _, _) = Client::join(&url, "Eve").await;
    let room_id = create_room(&mut ana, create_public("Lobby")).await;

    let code = eve.rejected(ClientCommand::Resync { room_id }).await;
    assert_eq!(code, ErrorCode::NotMember);
}

#[tokio::test]
async fn test_replica_follows_pushed_events() {
    let url = start_server().await;
    let (mut ana, _, _) = Client::join(&url, "Ana").await;
    let (mut bo, _, _) = Client::join(&url, "Bo").await;
    let room_id = create_room(&mut ana, create_public("Lobby")).await;

    let mut replica = RoomReplica::new(room_id.clone());
    let created = ana
        .event_where(|k| matches!(k, EventKind::RoomCreated { .. }))
        .await;
    replica.apply(created);

    bo.ok(ClientCommand::JoinRoom {
        room_id: room_id.clone(),
        password: None,
    })
    .await;
    let joined = ana
        .event_where(|k| matches!(k, EventKind::PlayerJoined { .. }))
        .await;
    replica.apply(joined);

    let authoritative = match ana.ok(ClientCommand::Resync { room_id }).await {
        ReplyBody::Snapshot { snapshot } => *snapshot,
        other => panic!("expected Snapshot, got {other:?}"),
    };
    assert_eq!(replica.snapshot(), Some(&authoritative));
}

#[tokio::test]
async fn test_start_game_by_guest_rejected_not_host() {
    let url = start_server().await;
    let (mut ana, _, _) = Client::join(&url, "Ana").await;
    let (mut bo, _, _) = Client::join(&url, "Bo").await;
    let room_id = create_room(&mut ana, create_public("Lobby")).await;
    bo.ok(ClientCommand::JoinRoom {
        room_id: room_id.clone(),
        password: None,
    })
    .await;

    let code = bo.rejected(ClientCommand::StartGame { room_id }).await;
    assert_eq!(code, ErrorCode::NotHost);
}

#[tokio::test]
async fn test_list_rooms_shows_public_rooms() {
    let url = start_server().await;
    let (mut ana, _, _) = Client::join(&url, "Ana").await;
    let room_id = create_room(&mut ana, create_public("Open Table")).await;

    match ana
        .ok(ClientCommand::ListRooms {
            filter: RoomFilter::default(),
        })
        .await
    {
        ReplyBody::RoomList { rooms } => {
            assert!(rooms.iter().any(|r| r.id == room_id && r.name == "Open Table"));
        }
        other => panic!("expected RoomList, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rename_updates_room_members() {
    let url = start_server().await;
    let (mut ana, ana_player, _) = Client::join(&url, "Ana").await;
    let room_id = create_room(&mut ana, create_public("Lobby")).await;

    match ana
        .ok(ClientCommand::Rename {
            display_name: "Anastasia".into(),
        })
        .await
    {
        ReplyBody::Renamed { player } => assert_eq!(player.display_name, "Anastasia"),
        other => panic!("expected Renamed, got {other:?}"),
    }

    let renamed = ana
        .event_where(|k| matches!(k, EventKind::PlayerRenamed { .. }))
        .await;
    match renamed.kind {
        EventKind::PlayerRenamed {
            player_id,
            display_name,
        } => {
            assert_eq!(player_id, ana_player.id);
            assert_eq!(display_name, "Anastasia");
        }
        other => panic!("expected PlayerRenamed, got {other:?}"),
    }

    match ana.ok(ClientCommand::Resync { room_id }).await {
        ReplyBody::Snapshot { snapshot } => {
            assert_eq!(snapshot.member(&ana_player.id).unwrap().display_name, "Anastasia");
        }
        other => panic!("expected Snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_leave_unknown_room_is_ack() {
    let url = start_server().await;
    let (mut ana, _, _) = Client::join(&url, "Ana").await;

    let body = ana
        .ok(ClientCommand::LeaveRoom {
            room_id: RoomId::new("NOPE42"),
        })
        .await;
    assert_eq!(body, ReplyBody::Ack);
}

#[tokio::test]
async fn test_expired_session_leaves_rooms() {
    let url = start_server_with(SessionConfig {
        reconnect_grace_secs: 0,
        sweep_interval_secs: 1,
        ..SessionConfig::default()
    })
    .await;
    let (mut ana, _, _) = Client::join(&url, "Ana").await;
    let (mut bo, bo_player, _) = Client::join(&url, "Bo").await;
    let room_id = create_room(&mut ana, create_public("Lobby")).await;
    bo.ok(ClientCommand::JoinRoom {
        room_id: room_id.clone(),
        password: None,
    })
    .await;

    bo.ws.close(None).await.unwrap();
    drop(bo);

    let left = ana
        .event_where(|k| matches!(k, EventKind::PlayerLeft { .. }))
        .await;
    match left.kind {
        EventKind::PlayerLeft { player_id, .. } => assert_eq!(player_id, bo_player.id),
        other => panic!("expected PlayerLeft, got {other:?}"),
    }
}
