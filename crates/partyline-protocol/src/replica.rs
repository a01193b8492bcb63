//! Client-side mirror of one room.
//!
//! A [`RoomReplica`] folds the event stream into a local
//! [`RoomSnapshot`]. Events must arrive gap-free: receiving sequence `N`
//! while holding `M < N - 1` means something was dropped, so the replica
//! parks the event and asks its owner to resync. The `Resync` reply
//! becomes the new baseline via [`RoomReplica::rebase`], after which any
//! parked events that follow it contiguously are replayed.

use std::collections::BTreeMap;

use crate::{RoomEvent, RoomId, RoomSnapshot};

/// What happened to an incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    /// Folded in; the replica is now at this sequence.
    Applied(u64),
    /// Already covered by the current baseline.
    Duplicate,
    /// Arrived ahead of a gap. The owner should send `Resync`.
    Gap { expected: u64, received: u64 },
}

/// Local copy of a room kept consistent through events and resyncs.
#[derive(Debug, Clone)]
pub struct RoomReplica {
    room_id: RoomId,
    snapshot: Option<RoomSnapshot>,
    /// Events that arrived after a gap, keyed by sequence.
    pending: BTreeMap<u64, RoomEvent>,
}

impl RoomReplica {
    /// A replica with no baseline yet. It accepts a `RoomCreated` event
    /// or a snapshot from `rebase`.
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            snapshot: None,
            pending: BTreeMap::new(),
        }
    }

    /// A replica seeded from a join or resync reply.
    pub fn from_snapshot(snapshot: RoomSnapshot) -> Self {
        Self {
            room_id: snapshot.id.clone(),
            snapshot: Some(snapshot),
            pending: BTreeMap::new(),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn snapshot(&self) -> Option<&RoomSnapshot> {
        self.snapshot.as_ref()
    }

    /// Sequence of the last folded event, 0 without a baseline.
    pub fn sequence(&self) -> u64 {
        self.snapshot.as_ref().map_or(0, |s| s.sequence)
    }

    /// `true` while parked events are waiting on a missing one.
    pub fn needs_resync(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Applies one pushed event.
    pub fn apply(&mut self, event: RoomEvent) -> ApplyResult {
        if event.room_id != self.room_id {
            tracing::debug!(
                room_id = %self.room_id,
                other = %event.room_id,
                "ignoring event for another room"
            );
            return ApplyResult::Duplicate;
        }

        let Some(current) = self.snapshot.as_ref().map(|s| s.sequence) else {
            // Without a baseline only the creation event can start one.
            if let Some(created) = RoomSnapshot::from_created(&event) {
                self.snapshot = Some(created);
                self.drain_pending();
                return ApplyResult::Applied(event.sequence);
            }
            let received = event.sequence;
            self.pending.insert(received, event);
            return ApplyResult::Gap {
                expected: 1,
                received,
            };
        };

        let expected = current + 1;
        if event.sequence < expected {
            return ApplyResult::Duplicate;
        }
        if event.sequence > expected {
            let received = event.sequence;
            tracing::debug!(
                room_id = %self.room_id,
                expected,
                received,
                "sequence gap detected"
            );
            self.pending.insert(received, event);
            return ApplyResult::Gap { expected, received };
        }

        if let Some(snapshot) = self.snapshot.as_mut() {
            snapshot.apply(&event);
        }
        self.drain_pending();
        ApplyResult::Applied(self.sequence())
    }

    /// Replaces local state with an authoritative snapshot.
    ///
    /// Parked events at or below the snapshot's sequence are discarded;
    /// the ones directly after it are replayed.
    pub fn rebase(&mut self, snapshot: RoomSnapshot) {
        let baseline = snapshot.sequence;
        self.pending = self.pending.split_off(&(baseline + 1));
        self.snapshot = Some(snapshot);
        self.drain_pending();
        tracing::debug!(
            room_id = %self.room_id,
            baseline,
            now_at = self.sequence(),
            "replica rebased"
        );
    }

    /// Folds parked events that have become contiguous.
    fn drain_pending(&mut self) {
        let Some(snapshot) = self.snapshot.as_mut() else {
            return;
        };
        while let Some(event) = self.pending.remove(&(snapshot.sequence + 1))
        {
            snapshot.apply(&event);
        }
        let current = snapshot.sequence;
        self.pending.retain(|seq, _| *seq > current);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        EventKind, GameKind, GamePhase, Player, PlayerId, RoomSettings,
        RoomStatus, Visibility,
    };

    fn room() -> RoomId {
        RoomId::new("ROOM01")
    }

    fn initial() -> RoomSnapshot {
        RoomSnapshot {
            id: room(),
            name: "Trivia Night".into(),
            game_kind: GameKind::Trivia,
            visibility: Visibility::Public,
            host_player_id: PlayerId::new("p1"),
            members: vec![Player::new(PlayerId::new("p1"), "Ana")],
            teams: vec![],
            status: RoomStatus::Waiting,
            created_at: Utc::now(),
            settings: RoomSettings::default(),
            phase: GamePhase::Idle,
            round: 0,
            prompt: None,
            turn: None,
            scores: vec![],
            winners: vec![],
            sequence: 0,
        }
    }

    fn created() -> RoomEvent {
        RoomEvent {
            room_id: room(),
            sequence: 1,
            kind: EventKind::RoomCreated {
                snapshot: Box::new(initial()),
            },
        }
    }

    fn joined(sequence: u64, id: &str) -> RoomEvent {
        RoomEvent {
            room_id: room(),
            sequence,
            kind: EventKind::PlayerJoined {
                player: Player::new(PlayerId::new(id), id),
            },
        }
    }

    #[test]
    fn test_apply_created_event_starts_baseline() {
        let mut replica = RoomReplica::new(room());
        assert_eq!(replica.apply(created()), ApplyResult::Applied(1));
        assert_eq!(replica.sequence(), 1);
        assert!(!replica.needs_resync());
    }

    #[test]
    fn test_apply_in_order_events_advances_sequence() {
        let mut replica = RoomReplica::new(room());
        replica.apply(created());
        assert_eq!(replica.apply(joined(2, "p2")), ApplyResult::Applied(2));
        assert_eq!(replica.apply(joined(3, "p3")), ApplyResult::Applied(3));
        assert_eq!(replica.snapshot().unwrap().members.len(), 3);
    }

    #[test]
    fn test_apply_old_event_is_duplicate() {
        let mut replica = RoomReplica::new(room());
        replica.apply(created());
        replica.apply(joined(2, "p2"));
        assert_eq!(replica.apply(joined(2, "p2")), ApplyResult::Duplicate);
        assert_eq!(replica.snapshot().unwrap().members.len(), 2);
    }

    #[test]
    fn test_apply_gap_requests_resync() {
        let mut replica = RoomReplica::new(room());
        replica.apply(created());

        let result = replica.apply(joined(4, "p4"));

        assert_eq!(
            result,
            ApplyResult::Gap {
                expected: 2,
                received: 4
            }
        );
        assert!(replica.needs_resync());
        assert_eq!(replica.sequence(), 1);
    }

    #[test]
    fn test_late_missing_event_drains_parked_ones() {
        let mut replica = RoomReplica::new(room());
        replica.apply(created());
        replica.apply(joined(3, "p3"));

        assert_eq!(replica.apply(joined(2, "p2")), ApplyResult::Applied(3));
        assert!(!replica.needs_resync());
    }

    #[test]
    fn test_rebase_discards_covered_and_replays_following() {
        let mut replica = RoomReplica::new(room());
        replica.apply(created());
        replica.apply(joined(3, "p3"));
        replica.apply(joined(5, "p5"));

        // Authoritative state at sequence 4 already contains p2 and p3.
        let mut baseline = initial();
        baseline.members.push(Player::new(PlayerId::new("p2"), "p2"));
        baseline.members.push(Player::new(PlayerId::new("p3"), "p3"));
        baseline.members.push(Player::new(PlayerId::new("p4"), "p4"));
        baseline.sequence = 4;
        replica.rebase(baseline);

        assert_eq!(replica.sequence(), 5);
        assert_eq!(replica.snapshot().unwrap().members.len(), 5);
        assert!(!replica.needs_resync());
    }

    #[test]
    fn test_events_before_baseline_are_parked() {
        let mut replica = RoomReplica::new(room());
        assert!(matches!(
            replica.apply(joined(7, "p7")),
            ApplyResult::Gap { .. }
        ));

        let mut baseline = initial();
        baseline.sequence = 6;
        replica.rebase(baseline);

        assert_eq!(replica.sequence(), 7);
    }

    #[test]
    fn test_event_for_other_room_is_ignored() {
        let mut replica = RoomReplica::new(room());
        replica.apply(created());
        let mut stray = joined(2, "p2");
        stray.room_id = RoomId::new("OTHER1");
        assert_eq!(replica.apply(stray), ApplyResult::Duplicate);
        assert_eq!(replica.sequence(), 1);
    }
}
