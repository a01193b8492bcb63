//! Identity issuance.
//!
//! Partyline makes no authentication claims: an identity is a unique id
//! plus a display name the player picked. The [`IdentityProvider`] trait
//! is the seam where a deployment could plug in real accounts.

use partyline_protocol::{Player, PlayerId};
use uuid::Uuid;

use crate::SessionError;

/// Longest display name accepted, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 32;

/// Issues a player identity for a freshly connected client.
///
/// # Example
///
/// ```rust
/// use partyline_protocol::{Player, PlayerId};
/// use partyline_session::{IdentityProvider, SessionError, normalize_display_name};
///
/// /// Uses the display name itself as the id. Tests only.
/// struct NameAsId;
///
/// impl IdentityProvider for NameAsId {
///     async fn issue(&self, display_name: &str) -> Result<Player, SessionError> {
///         let name = normalize_display_name(display_name)?;
///         Ok(Player::new(PlayerId::new(name.clone()), name))
///     }
/// }
/// ```
pub trait IdentityProvider: Send + Sync + 'static {
    /// Returns a player with a fresh, unique id.
    ///
    /// # Errors
    /// [`SessionError::InvalidDisplayName`] when the name is unusable.
    fn issue(
        &self,
        display_name: &str,
    ) -> impl std::future::Future<Output = Result<Player, SessionError>> + Send;
}

/// Random v4 UUIDs, no credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousIdentity;

impl IdentityProvider for AnonymousIdentity {
    async fn issue(&self, display_name: &str) -> Result<Player, SessionError> {
        let name = normalize_display_name(display_name)?;
        let id = PlayerId::new(Uuid::new_v4().to_string());
        tracing::debug!(player_id = %id, "identity issued");
        Ok(Player::new(id, name))
    }
}

/// Trims surrounding whitespace and enforces the length limit.
pub fn normalize_display_name(raw: &str) -> Result<String, SessionError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(SessionError::InvalidDisplayName(
            "display name must not be blank".into(),
        ));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(SessionError::InvalidDisplayName(format!(
            "display name longer than {MAX_DISPLAY_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}
