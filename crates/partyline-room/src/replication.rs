//! The replication side of a room: the sequence-numbered event log and
//! fan-out to subscribers.
//!
//! Both are owned by the room actor, which is the only writer. Each
//! subscriber has its own bounded queue. Delivery never blocks the
//! room: a full queue loses that event for that subscriber only, and the
//! client notices the gap and resyncs.

use std::collections::{HashMap, VecDeque};

use partyline_protocol::{EventKind, PlayerId, RoomEvent, RoomId};
use tokio::sync::mpsc;

/// Where a subscriber's events go.
pub type EventSender = mpsc::Sender<RoomEvent>;

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Bounded in-memory log of a room's recent events.
#[derive(Debug)]
pub struct EventLog {
    room_id: RoomId,
    events: VecDeque<RoomEvent>,
    capacity: usize,
    last_sequence: u64,
}

impl EventLog {
    pub fn new(room_id: RoomId, capacity: usize) -> Self {
        Self {
            room_id,
            events: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
            last_sequence: 0,
        }
    }

    /// Assigns the next sequence number and records the event.
    pub fn append(&mut self, kind: EventKind) -> RoomEvent {
        self.last_sequence += 1;
        let event = RoomEvent {
            room_id: self.room_id.clone(),
            sequence: self.last_sequence,
            kind,
        };
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event.clone());
        event
    }

    /// Sequence of the newest event; 0 before the first.
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Oldest sequence still retained.
    pub fn oldest_sequence(&self) -> Option<u64> {
        self.events.front().map(|e| e.sequence)
    }

    /// Retained events with a sequence above `after`, oldest first.
    pub fn since(&self, after: u64) -> Vec<RoomEvent> {
        self.events
            .iter()
            .filter(|e| e.sequence > after)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// The room's live subscribers, one queue per player.
#[derive(Debug)]
pub struct Subscribers {
    room_id: RoomId,
    senders: HashMap<PlayerId, EventSender>,
}

impl Subscribers {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            senders: HashMap::new(),
        }
    }

    /// Registers `sender` for `player_id`, replacing an older one.
    pub fn subscribe(&mut self, player_id: PlayerId, sender: EventSender) {
        self.senders.insert(player_id, sender);
    }

    pub fn unsubscribe(&mut self, player_id: &PlayerId) {
        self.senders.remove(player_id);
    }

    /// Offers the event to every subscriber without waiting. Closed
    /// queues are dropped. Returns how many subscribers missed it.
    pub fn broadcast(&mut self, event: &RoomEvent) -> usize {
        let mut missed = 0;
        let room_id = &self.room_id;
        self.senders.retain(|player_id, sender| {
            match sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    missed += 1;
                    tracing::warn!(
                        %room_id,
                        %player_id,
                        sequence = event.sequence,
                        "subscriber queue full, event dropped"
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    missed += 1;
                    tracing::debug!(%room_id, %player_id, "subscriber gone");
                    false
                }
            }
        });
        missed
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
