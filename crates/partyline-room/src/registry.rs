//! The room registry: creates rooms, finds them, and routes requests to
//! their actors.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use chrono::Utc;
use partyline_protocol::{
    Outcome, Player, PlayerId, RoomEvent, RoomFilter, RoomId, RoomSnapshot,
    RoomStatus, RoomSummary, Team, TeamId, Visibility,
};
use rand::Rng;
use tokio::sync::Mutex;

use crate::actor::{JoinOutcome, LeaveOutcome, RoomHandle, spawn_room};
use crate::replication::EventSender;
use crate::room::{NewRoom, Room};
use crate::{
    GameCatalog, MemorySnapshotStore, RegistryConfig, RoomError, SnapshotStore,
    TurnEngine, hash_password,
};

/// Characters used in room codes. No I, O, 0, or 1.
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Every live room, keyed by its code.
///
/// Safe to share behind an `Arc`. The map lock is held only to look up
/// or insert handles, never across a call into a room.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomId, RoomHandle>>,
    config: RegistryConfig,
    catalog: Arc<GameCatalog>,
    store: Arc<dyn SnapshotStore>,
}

impl RoomRegistry {
    pub fn new(
        config: RegistryConfig,
        catalog: Arc<GameCatalog>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            config,
            catalog,
            store,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn catalog(&self) -> &GameCatalog {
        &self.catalog
    }

    /// Creates a room hosted by `host` and returns its code.
    ///
    /// `subscriber`, if given, receives the room's events from
    /// `RoomCreated` on.
    pub async fn create_room(
        &self,
        spec: NewRoom,
        host: Player,
        subscriber: Option<EventSender>,
    ) -> Result<RoomId, RoomError> {
        let variant = self.catalog.variant(spec.game_kind);
        spec.validate(variant.as_ref())?;

        let password_hash = match (&spec.visibility, &spec.password) {
            (Visibility::Private, Some(password)) => {
                let password = password.clone();
                let hashed = tokio::task::spawn_blocking(move || hash_password(&password))
                    .await
                    .map_err(|e| RoomError::PasswordHash(e.to_string()))??;
                Some(hashed)
            }
            _ => None,
        };

        let now = Utc::now();
        let max_players = variant.max_players();
        let mut subscriber = subscriber;
        let mut rooms = self.rooms.lock().await;
        let mut last_err = None;

        for _ in 0..self.config.max_id_attempts.max(1) {
            let room_id = generate_room_code(self.config.room_code_len);
            match rooms.entry(room_id.clone()) {
                Entry::Occupied(_) => {
                    tracing::debug!(%room_id, "room code taken, retrying");
                    last_err = Some(RoomError::DuplicateRoomId(room_id));
                }
                Entry::Vacant(slot) => {
                    let room = Room::new(
                        room_id.clone(),
                        &spec,
                        host.clone(),
                        password_hash.clone(),
                        max_players,
                        now,
                    );
                    let engine = TurnEngine::new(Arc::clone(&variant));
                    let handle = spawn_room(
                        room,
                        engine,
                        subscriber.take(),
                        Arc::clone(&self.store),
                        &self.config,
                    );
                    slot.insert(handle);
                    tracing::info!(
                        %room_id,
                        kind = %spec.game_kind,
                        host = %host.id,
                        "room created"
                    );
                    return Ok(room_id);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            RoomError::DuplicateRoomId(RoomId::new(String::new()))
        }))
    }

    /// Adds `player` to the room, or confirms they are already in it.
    pub async fn join_room(
        &self,
        room_id: &RoomId,
        player: Player,
        password: Option<String>,
        subscriber: Option<EventSender>,
    ) -> Result<JoinOutcome, RoomError> {
        let handle = self.handle(room_id).await?;
        let result = handle.join(player, password, subscriber).await;
        self.forget_if_gone(&handle, &result).await;
        result
    }

    /// Removes `player_id` from the room. An empty room is destroyed and
    /// forgotten.
    pub async fn leave_room(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Result<LeaveOutcome, RoomError> {
        let handle = self.handle(room_id).await?;
        let result = handle.leave(player_id.clone()).await;
        self.forget_if_gone(&handle, &result).await;
        let outcome = result?;
        if outcome.destroyed {
            self.forget(&handle).await;
            tracing::info!(%room_id, "room destroyed");
        }
        Ok(outcome)
    }

    /// Moves the room's status forward. Backward moves are refused.
    pub async fn update_status(
        &self,
        room_id: &RoomId,
        status: RoomStatus,
    ) -> Result<(), RoomError> {
        self.handle(room_id).await?.update_status(status).await
    }

    pub async fn start_game(&self, room_id: &RoomId, actor: &PlayerId) -> Result<(), RoomError> {
        self.handle(room_id).await?.start_game(actor.clone()).await
    }

    pub async fn submit_outcome(
        &self,
        room_id: &RoomId,
        actor: &PlayerId,
        turn_id: u64,
        outcome: Outcome,
    ) -> Result<(), RoomError> {
        self.handle(room_id)
            .await?
            .submit_outcome(actor.clone(), turn_id, outcome)
            .await
    }

    pub async fn end_game(&self, room_id: &RoomId, actor: &PlayerId) -> Result<(), RoomError> {
        self.handle(room_id).await?.end_game(actor.clone()).await
    }

    pub async fn reset_game(&self, room_id: &RoomId, actor: &PlayerId) -> Result<(), RoomError> {
        self.handle(room_id).await?.reset_game(actor.clone()).await
    }

    pub async fn create_team(
        &self,
        room_id: &RoomId,
        actor: &PlayerId,
        name: impl Into<String>,
        color: impl Into<String>,
    ) -> Result<Team, RoomError> {
        self.handle(room_id)
            .await?
            .create_team(actor.clone(), name.into(), color.into())
            .await
    }

    pub async fn join_team(
        &self,
        room_id: &RoomId,
        actor: &PlayerId,
        team_id: &TeamId,
    ) -> Result<(), RoomError> {
        self.handle(room_id)
            .await?
            .join_team(actor.clone(), team_id.clone())
            .await
    }

    pub async fn rename(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        display_name: impl Into<String>,
    ) -> Result<(), RoomError> {
        self.handle(room_id)
            .await?
            .rename(player_id.clone(), display_name.into())
            .await
    }

    /// The authoritative snapshot, for a member that lost track.
    pub async fn resync(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Result<RoomSnapshot, RoomError> {
        let snapshot = self.handle(room_id).await?.snapshot().await?;
        if !snapshot.is_member(player_id) {
            return Err(RoomError::NotMember(player_id.clone(), room_id.clone()));
        }
        Ok(snapshot)
    }

    /// Reattaches a member's event queue and returns the current state.
    pub async fn subscribe(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        subscriber: EventSender,
    ) -> Result<RoomSnapshot, RoomError> {
        self.handle(room_id)
            .await?
            .subscribe(player_id.clone(), subscriber)
            .await
    }

    pub async fn unsubscribe(&self, room_id: &RoomId, player_id: &PlayerId) -> Result<(), RoomError> {
        self.handle(room_id).await?.unsubscribe(player_id.clone()).await
    }

    pub async fn snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot, RoomError> {
        self.handle(room_id).await?.snapshot().await
    }

    /// Retained events after `after`.
    pub async fn events_since(
        &self,
        room_id: &RoomId,
        after: u64,
    ) -> Result<Vec<RoomEvent>, RoomError> {
        self.handle(room_id).await?.events_since(after).await
    }

    /// Summaries of the rooms matching `filter`, oldest first.
    ///
    /// Rooms that stop answering while the listing is built are skipped.
    pub async fn list_rooms(&self, filter: &RoomFilter) -> RoomListing {
        let handles: Vec<RoomHandle> = self.rooms.lock().await.values().cloned().collect();

        let mut rooms = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(summary) = handle.summary().await {
                if filter.matches(&summary) {
                    rooms.push(summary);
                }
            }
        }
        rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        RoomListing {
            rooms: rooms.into(),
        }
    }

    /// The handle for `room_id`.
    pub async fn handle(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        self.rooms
            .lock()
            .await
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Stops every room. Used on server shutdown.
    pub async fn shutdown(&self) {
        let handles: Vec<RoomHandle> = self.rooms.lock().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            let _ = handle.shutdown().await;
        }
    }

    async fn forget_if_gone<T>(&self, handle: &RoomHandle, result: &Result<T, RoomError>) {
        if matches!(result, Err(RoomError::Unavailable(_))) {
            self.forget(handle).await;
        }
    }

    /// Drops the map entry if it still points at `handle`'s actor.
    async fn forget(&self, handle: &RoomHandle) {
        let mut rooms = self.rooms.lock().await;
        if rooms
            .get(handle.room_id())
            .is_some_and(|current| current.same_room_task(handle))
        {
            rooms.remove(handle.room_id());
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(
            RegistryConfig::default(),
            Arc::new(GameCatalog::standard()),
            Arc::new(MemorySnapshotStore::new()),
        )
    }
}

fn generate_room_code(len: usize) -> RoomId {
    let mut rng = rand::rng();
    let code: String = (0..len.max(1))
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect();
    RoomId::new(code)
}

// ---------------------------------------------------------------------------
// RoomListing
// ---------------------------------------------------------------------------

/// A point-in-time listing of rooms. Iterate it as often as needed.
#[derive(Debug, Clone, Default)]
pub struct RoomListing {
    rooms: Arc<[RoomSummary]>,
}

impl RoomListing {
    pub fn iter(&self) -> std::slice::Iter<'_, RoomSummary> {
        self.rooms.iter()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn to_vec(&self) -> Vec<RoomSummary> {
        self.rooms.to_vec()
    }
}

impl<'a> IntoIterator for &'a RoomListing {
    type Item = &'a RoomSummary;
    type IntoIter = std::slice::Iter<'a, RoomSummary>;

    fn into_iter(self) -> Self::IntoIter {
        self.rooms.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_room_code_uses_unambiguous_alphabet() {
        for _ in 0..100 {
            let code = generate_room_code(6);
            assert_eq!(code.as_str().len(), 6);
            assert!(code.as_str().bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_room_listing_iterates_repeatedly() {
        let listing = RoomListing::default();
        assert_eq!(listing.iter().count(), 0);
        assert_eq!((&listing).into_iter().count(), 0);
        assert!(listing.is_empty());
    }
}
