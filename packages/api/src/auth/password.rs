//! # Password hashing and verification (Argon2id)
//!
//! - [`hash_password`] generates a random salt via [`OsRng`], hashes the plaintext with the
//!   default Argon2id parameters and returns a PHC-format string
//!   (`$argon2id$v=19$m=19456,t=2,p=1$...`), stored as `MemberAccount::password_hash`.
//! - [`verify_password`] checks a plaintext against a stored PHC string. A malformed hash
//!   is an error; a mismatch is `Ok(false)`.
//! - [`random_password`] produces the throwaway credential given to accounts created by a
//!   CSV import.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::PortalError;

/// Hash a password using Argon2id. Returns a PHC-format string.
pub fn hash_password(password: &str) -> Result<String, PortalError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PortalError::Password(format!("failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against a PHC-format hash string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PortalError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PortalError::Password(format!("invalid password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn random_password(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Xk7!qLmZ9").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Xk7!qLmZ9", &hash).unwrap());
        assert!(!verify_password("xk7!qlmz9", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(PortalError::Password(_))
        ));
    }

    #[test]
    fn test_random_password_shape() {
        let password = random_password(24);
        assert_eq!(password.len(), 24);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
