use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Failed to hash password: {0}")]
pub struct PasswordError(String);

/// Argon2id hash in PHC string format, salted per call.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use argon2::password_hash::{PasswordHash, PasswordVerifier};

    use super::*;

    fn verifies(password: &str, hash: &str) -> bool {
        let parsed = PasswordHash::new(hash).unwrap();
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    }

    #[test]
    fn test_hash_is_argon2_phc_string() {
        let hash = hash_password("pass1234").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(!hash.contains("pass1234"));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let first = hash_password("pass1234").unwrap();
        let second = hash_password("pass1234").unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_hash_verifies_only_original_password() {
        let hash = hash_password("p@ssw0rd!#密码").unwrap();

        assert!(verifies("p@ssw0rd!#密码", &hash));
        assert!(!verifies("p@ssw0rd", &hash));
    }
}
