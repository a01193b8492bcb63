//! Session records and the knobs that govern their lifetime.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use partyline_protocol::{Player, RoomId};
use partyline_transport::ConnectionId;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timeouts for the session layer.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a dropped player keeps their room memberships. Zero
    /// evicts on the first sweep after the disconnect.
    pub reconnect_grace_secs: u64,

    /// How often the gateway sweeps for expired sessions.
    pub sweep_interval_secs: u64,

    /// A connection that sends nothing (not even a heartbeat) for this
    /// long is treated as dropped.
    pub idle_timeout_secs: u64,
}

impl SessionConfig {
    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_secs(self.reconnect_grace_secs)
    }

    /// Never zero, so the sweeper's interval stays valid.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: 30,
            sweep_interval_secs: 5,
            idle_timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle of one player's session.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(grace elapsed)──→ Expired
///       ↑                            │
///       └──────────(resume)──────────┘
/// ```
#[derive(Debug, Clone)]
pub enum SessionState {
    Connected,
    /// Dropped at `since`; resumable until `since + grace`.
    Disconnected { since: Instant },
    /// Waiting for the gateway to evict it from its rooms.
    Expired,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The server's record of one player.
#[derive(Debug, Clone)]
pub struct Session {
    pub player: Player,
    pub state: SessionState,

    /// The live connection, `None` while disconnected.
    pub connection: Option<ConnectionId>,

    /// Secret handed out in `Welcome`; presenting it in a later `Hello`
    /// rebinds this identity. 32 hex characters.
    pub resume_token: String,

    /// Rooms the player currently belongs to. On expiry the gateway
    /// leaves each of them on the player's behalf.
    pub rooms: BTreeSet<RoomId>,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected)
    }
}
