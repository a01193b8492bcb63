//! Where room snapshots are persisted after each commit.

use std::collections::HashMap;
use std::sync::Mutex;

use partyline_protocol::{RoomId, RoomSnapshot};

/// Persistence seam for room state.
///
/// The room actor saves its snapshot after every commit and removes it
/// when the room is destroyed. Implementations must be cheap; they run
/// on the room's task.
pub trait SnapshotStore: Send + Sync + 'static {
    fn save(&self, snapshot: &RoomSnapshot);
    fn load(&self, room_id: &RoomId) -> Option<RoomSnapshot>;
    fn remove(&self, room_id: &RoomId);
}

/// Keeps the latest snapshot of each room in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<RoomId, RoomSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, snapshot: &RoomSnapshot) {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(snapshot.id.clone(), snapshot.clone());
    }

    fn load(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(room_id)
            .cloned()
    }

    fn remove(&self, room_id: &RoomId) {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(room_id);
    }
}
