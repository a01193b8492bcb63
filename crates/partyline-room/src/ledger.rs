//! Per-room cumulative scores.

use std::collections::BTreeMap;

use partyline_protocol::{ParticipantId, ScoreEntry};

/// Participant → score. Scores only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreLedger {
    scores: BTreeMap<ParticipantId, u32>,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `delta` and returns the new total.
    pub fn award(&mut self, participant: &ParticipantId, delta: u32) -> u32 {
        let total = self.scores.entry(participant.clone()).or_insert(0);
        *total = total.saturating_add(delta);
        *total
    }

    pub fn score_of(&self, participant: &ParticipantId) -> u32 {
        self.scores.get(participant).copied().unwrap_or(0)
    }

    /// Rows sorted by participant, matching the snapshot layout.
    pub fn snapshot(&self) -> Vec<ScoreEntry> {
        self.scores
            .iter()
            .map(|(participant, score)| ScoreEntry {
                participant: participant.clone(),
                score: *score,
            })
            .collect()
    }

    /// Everyone holding the top score. Empty when nobody has scored.
    pub fn winners(&self) -> Vec<ParticipantId> {
        let Some(best) = self.scores.values().copied().max() else {
            return Vec::new();
        };
        if best == 0 {
            return Vec::new();
        }
        self.scores
            .iter()
            .filter(|(_, score)| **score == best)
            .map(|(participant, _)| participant.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.scores.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}
