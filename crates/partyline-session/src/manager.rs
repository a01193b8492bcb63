//! The session manager: every connected or recently dropped player.
//!
//! `SessionManager` is a plain struct with no interior locking. The
//! gateway keeps it behind one `Mutex` and never holds that lock across
//! a room call.

use std::collections::HashMap;

use partyline_protocol::{Player, PlayerId, RoomId};
use partyline_transport::ConnectionId;
use rand::Rng;

use crate::{
    Session, SessionConfig, SessionError, SessionState, normalize_display_name,
};

/// A session the grace period ran out on, with the rooms it still held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredSession {
    pub player_id: PlayerId,
    pub rooms: Vec<RoomId>,
}

/// Tracks sessions by player, by resume token, and by connection.
///
/// ```text
/// create() ──→ [Connected] ──disconnect()──→ [Disconnected]
///                  ↑                              │    │
///                  └───────────resume()───────────┘    │ expire_stale()
///                                                      ▼
///                                   cleanup_expired() ← [Expired]
/// ```
pub struct SessionManager {
    sessions: HashMap<PlayerId, Session>,

    /// Resume token → owner. Kept in sync with `sessions`.
    tokens: HashMap<String, PlayerId>,

    /// Live connection → owner.
    connections: HashMap<ConnectionId, PlayerId>,

    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            tokens: HashMap::new(),
            connections: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Opens a session for a freshly issued player on `connection`.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the player is already live.
    pub fn create(
        &mut self,
        player: Player,
        connection: ConnectionId,
    ) -> Result<&Session, SessionError> {
        let player_id = player.id.clone();
        if let Some(existing) = self.sessions.get(&player_id) {
            if existing.is_connected() {
                return Err(SessionError::AlreadyConnected(player_id));
            }
            self.tokens.remove(&existing.resume_token);
        }

        let token = generate_token();
        let session = Session {
            player,
            state: SessionState::Connected,
            connection: Some(connection),
            resume_token: token.clone(),
            rooms: Default::default(),
        };

        self.tokens.insert(token, player_id.clone());
        self.connections.insert(connection, player_id.clone());
        tracing::info!(%player_id, %connection, "session created");

        Ok(&*self.sessions.entry(player_id).insert_entry(session).into_mut())
    }

    /// Rebinds a dropped session to a new connection.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`]: token not recognized
    /// - [`SessionError::SessionExpired`]: grace period elapsed
    /// - [`SessionError::AlreadyConnected`]: the old connection is still live
    pub fn resume(
        &mut self,
        token: &str,
        connection: ConnectionId,
    ) -> Result<&Session, SessionError> {
        let player_id = self
            .tokens
            .get(token)
            .cloned()
            .ok_or(SessionError::InvalidToken)?;
        let grace = self.config.reconnect_grace();

        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::InvalidToken)?;

        match session.state {
            SessionState::Disconnected { since } => {
                if since.elapsed() > grace {
                    session.state = SessionState::Expired;
                    return Err(SessionError::SessionExpired(player_id));
                }
                session.state = SessionState::Connected;
                session.connection = Some(connection);
                self.connections.insert(connection, player_id.clone());
                tracing::info!(%player_id, %connection, "session resumed");
                Ok(&*session)
            }
            SessionState::Connected => {
                Err(SessionError::AlreadyConnected(player_id))
            }
            SessionState::Expired => Err(SessionError::SessionExpired(player_id)),
        }
    }

    /// Marks the player behind `connection` as dropped and starts the
    /// grace period. Returns the player, or `None` if the connection was
    /// never bound (handshake failed, or it was already released).
    pub fn disconnect(&mut self, connection: ConnectionId) -> Option<PlayerId> {
        let player_id = self.connections.remove(&connection)?;
        let session = self.sessions.get_mut(&player_id)?;
        if session.connection != Some(connection) {
            return None;
        }
        session.connection = None;
        session.state = SessionState::Disconnected {
            since: std::time::Instant::now(),
        };
        tracing::info!(%player_id, %connection, "player disconnected, grace period started");
        Some(player_id)
    }

    /// The player bound to a live connection.
    pub fn player_for(&self, connection: ConnectionId) -> Option<&Player> {
        let player_id = self.connections.get(&connection)?;
        self.sessions.get(player_id).map(|s| &s.player)
    }

    /// Changes a player's display name.
    ///
    /// # Errors
    /// [`SessionError::InvalidDisplayName`] or [`SessionError::NotFound`].
    pub fn rename(
        &mut self,
        player_id: &PlayerId,
        display_name: &str,
    ) -> Result<&Player, SessionError> {
        let name = normalize_display_name(display_name)?;
        let session = self
            .sessions
            .get_mut(player_id)
            .ok_or_else(|| SessionError::NotFound(player_id.clone()))?;
        session.player.display_name = name;
        Ok(&session.player)
    }

    /// Records that the player joined `room_id`.
    pub fn track_room(&mut self, player_id: &PlayerId, room_id: RoomId) {
        if let Some(session) = self.sessions.get_mut(player_id) {
            session.rooms.insert(room_id);
        }
    }

    /// Records that the player is no longer in `room_id`.
    pub fn untrack_room(&mut self, player_id: &PlayerId, room_id: &RoomId) {
        if let Some(session) = self.sessions.get_mut(player_id) {
            session.rooms.remove(room_id);
        }
    }

    /// Expires every session whose grace period has elapsed and returns
    /// them with their rooms, so the caller can evict them.
    pub fn expire_stale(&mut self) -> Vec<ExpiredSession> {
        let grace = self.config.reconnect_grace();
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            let SessionState::Disconnected { since } = session.state else {
                continue;
            };
            if since.elapsed() <= grace {
                continue;
            }
            session.state = SessionState::Expired;
            tracing::info!(
                player_id = %session.player.id,
                rooms = session.rooms.len(),
                "session expired"
            );
            expired.push(ExpiredSession {
                player_id: session.player.id.clone(),
                rooms: session.rooms.iter().cloned().collect(),
            });
        }

        expired
    }

    /// Drops expired sessions and their tokens.
    pub fn cleanup_expired(&mut self) {
        let tokens = &mut self.tokens;
        self.sessions.retain(|_, session| {
            if matches!(session.state, SessionState::Expired) {
                tokens.remove(&session.resume_token);
                false
            } else {
                true
            }
        });
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<&Session> {
        self.sessions.get(player_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// 16 random bytes as 32 lowercase hex characters.
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Time-dependent cases use a 0-second grace (expires at once) or a
    //! 3600-second grace (never expires during the test).

    use super::*;

    fn manager_with_instant_expiry() -> SessionManager {
        SessionManager::new(SessionConfig {
            reconnect_grace_secs: 0,
            ..SessionConfig::default()
        })
    }

    fn manager_with_long_grace() -> SessionManager {
        SessionManager::new(SessionConfig {
            reconnect_grace_secs: 3600,
            ..SessionConfig::default()
        })
    }

    fn player(id: &str) -> Player {
        Player::new(PlayerId::new(id), id.to_uppercase())
    }

    fn pid(id: &str) -> PlayerId {
        PlayerId::new(id)
    }

    fn conn(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    /// Makes `Disconnected` sessions older than any zero grace period.
    fn let_time_pass() {
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    // =====================================================================
    // create()
    // =====================================================================

    #[test]
    fn test_create_new_player_returns_connected_session() {
        let mut mgr = manager_with_long_grace();

        let session = mgr.create(player("p1"), conn(1)).expect("should succeed");

        assert!(session.is_connected());
        assert_eq!(session.player.id, pid("p1"));
        assert_eq!(session.connection, Some(conn(1)));
        assert_eq!(session.resume_token.len(), 32);
    }

    #[test]
    fn test_create_multiple_players_each_gets_unique_token() {
        let mut mgr = manager_with_long_grace();

        let t1 = mgr.create(player("p1"), conn(1)).unwrap().resume_token.clone();
        let t2 = mgr.create(player("p2"), conn(2)).unwrap().resume_token.clone();

        assert_ne!(t1, t2);
    }

    #[test]
    fn test_create_already_connected_returns_error() {
        let mut mgr = manager_with_long_grace();
        mgr.create(player("p1"), conn(1)).unwrap();

        let result = mgr.create(player("p1"), conn(2));

        assert!(
            matches!(result, Err(SessionError::AlreadyConnected(p)) if p == pid("p1"))
        );
    }

    #[test]
    fn test_create_replaces_disconnected_session_and_old_token() {
        let mut mgr = manager_with_long_grace();
        let old = mgr.create(player("p1"), conn(1)).unwrap().resume_token.clone();
        mgr.disconnect(conn(1));

        mgr.create(player("p1"), conn(2)).expect("should replace");
        mgr.disconnect(conn(2));

        assert!(matches!(
            mgr.resume(&old, conn(3)),
            Err(SessionError::InvalidToken)
        ));
    }

    // =====================================================================
    // disconnect()
    // =====================================================================

    #[test]
    fn test_disconnect_bound_connection_starts_grace() {
        let mut mgr = manager_with_long_grace();
        mgr.create(player("p1"), conn(1)).unwrap();

        assert_eq!(mgr.disconnect(conn(1)), Some(pid("p1")));

        let session = mgr.get(&pid("p1")).expect("kept during grace");
        assert!(matches!(session.state, SessionState::Disconnected { .. }));
        assert!(session.connection.is_none());
        assert!(mgr.player_for(conn(1)).is_none());
    }

    #[test]
    fn test_disconnect_unknown_connection_returns_none() {
        let mut mgr = manager_with_long_grace();
        assert_eq!(mgr.disconnect(conn(99)), None);
    }

    #[test]
    fn test_disconnect_twice_is_a_no_op() {
        let mut mgr = manager_with_long_grace();
        mgr.create(player("p1"), conn(1)).unwrap();
        mgr.disconnect(conn(1));

        assert_eq!(mgr.disconnect(conn(1)), None);
    }

    // =====================================================================
    // resume()
    // =====================================================================

    #[test]
    fn test_resume_valid_token_rebinds_connection() {
        let mut mgr = manager_with_long_grace();
        let token = mgr.create(player("p1"), conn(1)).unwrap().resume_token.clone();
        mgr.track_room(&pid("p1"), RoomId::new("ROOM01"));
        mgr.disconnect(conn(1));

        let session = mgr.resume(&token, conn(2)).expect("should resume");

        assert!(session.is_connected());
        assert_eq!(session.connection, Some(conn(2)));
        assert!(session.rooms.contains(&RoomId::new("ROOM01")));
        assert_eq!(mgr.player_for(conn(2)).unwrap().id, pid("p1"));
    }

    #[test]
    fn test_resume_invalid_token_returns_error() {
        let mut mgr = manager_with_long_grace();
        mgr.create(player("p1"), conn(1)).unwrap();
        mgr.disconnect(conn(1));

        assert!(matches!(
            mgr.resume("not-a-real-token", conn(2)),
            Err(SessionError::InvalidToken)
        ));
    }

    #[test]
    fn test_resume_after_grace_period_returns_expired() {
        let mut mgr = manager_with_instant_expiry();
        let token = mgr.create(player("p1"), conn(1)).unwrap().resume_token.clone();
        mgr.disconnect(conn(1));
        let_time_pass();

        let result = mgr.resume(&token, conn(2));

        assert!(
            matches!(result, Err(SessionError::SessionExpired(p)) if p == pid("p1"))
        );
    }

    #[test]
    fn test_resume_while_connected_returns_error() {
        let mut mgr = manager_with_long_grace();
        let token = mgr.create(player("p1"), conn(1)).unwrap().resume_token.clone();

        assert!(matches!(
            mgr.resume(&token, conn(2)),
            Err(SessionError::AlreadyConnected(_))
        ));
    }

    #[test]
    fn test_disconnect_of_replaced_connection_keeps_new_one() {
        let mut mgr = manager_with_long_grace();
        let token = mgr.create(player("p1"), conn(1)).unwrap().resume_token.clone();
        mgr.disconnect(conn(1));
        mgr.resume(&token, conn(2)).unwrap();

        // The first connection's teardown lands late.
        assert_eq!(mgr.disconnect(conn(1)), None);
        assert!(mgr.get(&pid("p1")).unwrap().is_connected());
    }

    // =====================================================================
    // rename() / track_room()
    // =====================================================================

    #[test]
    fn test_rename_updates_player() {
        let mut mgr = manager_with_long_grace();
        mgr.create(player("p1"), conn(1)).unwrap();

        let renamed = mgr.rename(&pid("p1"), "  Bo ").unwrap();

        assert_eq!(renamed.display_name, "Bo");
        assert_eq!(mgr.player_for(conn(1)).unwrap().display_name, "Bo");
    }

    #[test]
    fn test_rename_blank_name_is_rejected() {
        let mut mgr = manager_with_long_grace();
        mgr.create(player("p1"), conn(1)).unwrap();

        assert!(matches!(
            mgr.rename(&pid("p1"), " "),
            Err(SessionError::InvalidDisplayName(_))
        ));
    }

    #[test]
    fn test_untrack_room_removes_membership() {
        let mut mgr = manager_with_long_grace();
        mgr.create(player("p1"), conn(1)).unwrap();
        mgr.track_room(&pid("p1"), RoomId::new("A"));
        mgr.track_room(&pid("p1"), RoomId::new("B"));

        mgr.untrack_room(&pid("p1"), &RoomId::new("A"));

        let rooms: Vec<_> = mgr.get(&pid("p1")).unwrap().rooms.iter().cloned().collect();
        assert_eq!(rooms, vec![RoomId::new("B")]);
    }

    // =====================================================================
    // expire_stale() / cleanup_expired()
    // =====================================================================

    #[test]
    fn test_expire_stale_reports_rooms_of_expired_players() {
        let mut mgr = manager_with_instant_expiry();
        mgr.create(player("p1"), conn(1)).unwrap();
        mgr.create(player("p2"), conn(2)).unwrap();
        mgr.track_room(&pid("p1"), RoomId::new("ROOM01"));
        mgr.disconnect(conn(1));
        let_time_pass();

        let expired = mgr.expire_stale();

        assert_eq!(
            expired,
            vec![ExpiredSession {
                player_id: pid("p1"),
                rooms: vec![RoomId::new("ROOM01")],
            }]
        );
        assert!(mgr.get(&pid("p2")).unwrap().is_connected());
    }

    #[test]
    fn test_expire_stale_skips_sessions_within_grace() {
        let mut mgr = manager_with_long_grace();
        mgr.create(player("p1"), conn(1)).unwrap();
        mgr.disconnect(conn(1));

        assert!(mgr.expire_stale().is_empty());
    }

    #[test]
    fn test_cleanup_expired_removes_session_and_token() {
        let mut mgr = manager_with_instant_expiry();
        let token = mgr.create(player("p1"), conn(1)).unwrap().resume_token.clone();
        mgr.create(player("p2"), conn(2)).unwrap();
        mgr.disconnect(conn(1));
        let_time_pass();
        mgr.expire_stale();

        mgr.cleanup_expired();

        assert_eq!(mgr.len(), 1);
        assert!(mgr.get(&pid("p1")).is_none());
        assert!(matches!(
            mgr.resume(&token, conn(3)),
            Err(SessionError::InvalidToken)
        ));
    }
}
