//! Argon2 hashing for private-room passwords.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::Rng;

use crate::RoomError;

/// Hashes a room password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, RoomError> {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| RoomError::PasswordHash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| RoomError::PasswordHash(e.to_string()))
}

/// `true` if `password` matches the stored hash. A malformed hash
/// never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        tracing::warn!("stored room password hash is malformed");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify_accepts_same_password() {
        let hash = hash_password("xyz").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("xyz", &hash));
    }

    #[test]
    fn test_verify_rejects_other_password() {
        let hash = hash_password("xyz").unwrap();
        assert!(!verify_password("abc", &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        assert_ne!(hash_password("xyz").unwrap(), hash_password("xyz").unwrap());
    }

    #[test]
    fn test_verify_malformed_hash_is_false() {
        assert!(!verify_password("xyz", "not-a-hash"));
    }
}
