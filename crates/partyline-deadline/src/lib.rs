//! Turn deadline timer for Partyline room actors.
//!
//! A room has at most one timed turn at a time, so the timer holds a
//! single slot: arming replaces whatever was armed before. The slot is
//! keyed by turn id; when it fires, the actor hands that id to the turn
//! engine, which ignores it if the turn already moved on.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         cmd = receiver.recv() => { /* handle command, then re-arm */ }
//!         expired = timer.wait_for_deadline() => {
//!             engine.timeout(expired.turn_id, now);
//!         }
//!     }
//! }
//! ```
//!
//! Time comes from `tokio::time`, so tests can run with a paused clock.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Lateness above which a fired deadline is logged as a warning.
const LATE_WARN_THRESHOLD: Duration = Duration::from_millis(250);

/// A deadline that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExpired {
    /// The turn the deadline belonged to.
    pub turn_id: u64,
    /// How far past the deadline the actor woke up.
    pub late_by: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    turn_id: u64,
    at: Instant,
}

/// One optional deadline, re-armed as turns change.
#[derive(Debug, Default)]
pub struct DeadlineTimer {
    armed: Option<Armed>,
    fired: u64,
}

impl DeadlineTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer for `turn_id`, `after` from now, replacing any
    /// earlier deadline. Returns the instant it will fire.
    pub fn arm(&mut self, turn_id: u64, after: Duration) -> Instant {
        let at = Instant::now() + after;
        if let Some(previous) = self.armed.replace(Armed { turn_id, at }) {
            trace!(previous = previous.turn_id, turn_id, "deadline replaced");
        }
        debug!(turn_id, after_ms = after.as_millis() as u64, "deadline armed");
        at
    }

    /// Disarms the timer. A no-op when nothing is armed.
    pub fn cancel(&mut self) {
        if let Some(armed) = self.armed.take() {
            debug!(turn_id = armed.turn_id, "deadline cancelled");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// The turn the armed deadline belongs to.
    pub fn armed_turn(&self) -> Option<u64> {
        self.armed.map(|a| a.turn_id)
    }

    /// When the armed deadline fires.
    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|a| a.at)
    }

    /// `true` if a deadline is armed and `now` is at or past it.
    ///
    /// Lets the actor settle a command that raced a deadline the select
    /// loop has not polled yet.
    pub fn has_passed(&self, now: Instant) -> bool {
        self.armed.is_some_and(|a| now >= a.at)
    }

    /// How many deadlines have fired over the timer's life.
    pub fn fired_count(&self) -> u64 {
        self.fired
    }

    /// Waits for the armed deadline and disarms it.
    ///
    /// Pends forever while nothing is armed, so it can sit in a
    /// `tokio::select!` next to the command channel. Cancel-safe: if the
    /// future is dropped before completing, the slot stays armed.
    pub async fn wait_for_deadline(&mut self) -> DeadlineExpired {
        let Some(armed) = self.armed else {
            return std::future::pending::<DeadlineExpired>().await;
        };

        time::sleep_until(armed.at).await;

        self.armed = None;
        self.fired += 1;
        let late_by = Instant::now().saturating_duration_since(armed.at);
        if late_by > LATE_WARN_THRESHOLD {
            warn!(
                turn_id = armed.turn_id,
                late_ms = late_by.as_millis() as u64,
                "deadline fired late"
            );
        } else {
            trace!(turn_id = armed.turn_id, "deadline fired");
        }

        DeadlineExpired {
            turn_id: armed.turn_id,
            late_by,
        }
    }
}
