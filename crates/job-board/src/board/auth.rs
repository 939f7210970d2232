use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use uuid::Uuid;

/// Name of the cookie carrying the session key.
pub const SESSION_COOKIE: &str = "sessionid";

#[derive(Debug, thiserror::Error)]
#[error("password hashing failed: {0}")]
pub struct CredentialError(String);

/// Hash a new password into a PHC string (`$argon2id$...`).
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| CredentialError(err.to_string()))
}

/// `false` for a wrong password and for hashes that cannot be parsed.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            tracing::warn!(error = %err, "stored password hash is malformed");
            false
        }
    }
}

/// Fresh opaque session key.
pub fn new_session_key() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_the_original_password() {
        let hash = hash_password("orchard-lantern-42").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("orchard-lantern-42", &hash));
        assert!(!verify_password("orchard-lantern-43", &hash));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let first = hash_password("same-password").expect("hash");
        let second = hash_password("same-password").expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_password("anything", "plaintext"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn session_keys_are_unique_hex() {
        let key = new_session_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, new_session_key());
    }
}
