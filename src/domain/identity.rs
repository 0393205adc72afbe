use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha256};

use crate::domain::RegistrationError;

/// Canonical form of a national id (CURP) before hashing
pub fn normalize_national_id(national_id: &str) -> String {
    national_id.trim().to_ascii_uppercase()
}

/// Deterministic SHA-256 of the normalized national id, lowercase hex.
/// Stored beside the encrypted value so duplicates can be found by equality.
pub fn hash_national_id(national_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_national_id(national_id).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash a password using Argon2id, returning the PHC string
pub fn hash_password(password: &str) -> Result<String, RegistrationError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| RegistrationError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored PHC hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, RegistrationError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| RegistrationError::Internal(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_hash_is_sha256_hex() {
        // sha256("ABC")
        assert_eq!(
            hash_national_id("abc"),
            "b5d4045c3f466fa91fe2cc6abe79232a1a57cdf104f7a26e716e0a1e2789df78"
        );
    }

    #[test]
    fn test_identity_hash_ignores_case_and_padding() {
        assert_eq!(
            hash_national_id(" loaa000101mjcpnna1 "),
            hash_national_id("LOAA000101MJCPNNA1")
        );
        assert_ne!(
            hash_national_id("LOAA000101MJCPNNA1"),
            hash_national_id("LOAA000101MJCPNNA2")
        );
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct-horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct-horse", &hash).unwrap());
        assert!(!verify_password("wrong-horse", &hash).unwrap());
    }

    #[test]
    fn test_password_salts_differ() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }
}
