//! Player identity and connection sessions for Partyline.
//!
//! 1. **Identity**: [`IdentityProvider`] hands each new client an
//!    opaque [`Player`](partyline_protocol::Player) record.
//! 2. **Sessions**: [`SessionManager`] binds connections to players and
//!    remembers which rooms each player belongs to.
//! 3. **Grace period**: a dropped connection leaves the player's room
//!    memberships alone until the grace period runs out; a resume token
//!    rebinds the identity before that.
//!
//! ```text
//! Gateway (above)  ← asks who a connection is, and who to evict
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← Player, PlayerId, RoomId
//! ```

mod error;
mod identity;
mod manager;
mod session;

pub use error::SessionError;
pub use identity::{
    AnonymousIdentity, IdentityProvider, MAX_DISPLAY_NAME_CHARS,
    normalize_display_name,
};
pub use manager::{ExpiredSession, SessionManager};
pub use session::{Session, SessionConfig, SessionState};
