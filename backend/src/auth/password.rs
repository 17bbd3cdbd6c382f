use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use thiserror::Error;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,

    #[error("Password hashing failed: {0}")]
    HashingFailed(argon2::password_hash::Error),

    #[error("Password hashing task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Rejects passwords shorter than the minimum length.
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    Ok(())
}

/// Hash a password using Argon2id with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    validate_password(password)?;
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(PasswordError::HashingFailed)?;
    Ok(password_hash.to_string())
}

/// Verify a password against a stored PHC hash string.
/// The digest comparison inside argon2 is constant-time.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(PasswordError::HashingFailed)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::HashingFailed(e)),
    }
}

/// `hash_password` on the blocking pool, keeping argon2 off the async workers.
pub async fn spawn_hash_password(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

/// `verify_password` on the blocking pool.
pub async fn spawn_verify_password(password: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_creates_valid_hash() {
        let hash = hash_password("test_password_123").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.len() > 50);
    }

    #[test]
    fn test_hash_password_generates_different_hashes() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password_success() {
        let hash = hash_password("correct_password").unwrap();
        assert!(verify_password("correct_password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_failure() {
        let hash = hash_password("correct_password").unwrap();
        assert!(!verify_password("wrong_password", &hash).unwrap());
        assert!(!verify_password("WRONG", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_with_invalid_hash() {
        let result = verify_password("any_password", "not_a_valid_hash");
        assert!(matches!(result, Err(PasswordError::HashingFailed(_))));
    }

    #[test]
    fn test_short_passwords_are_rejected() {
        assert!(matches!(hash_password(""), Err(PasswordError::TooShort)));
        assert!(matches!(hash_password("1234567"), Err(PasswordError::TooShort)));
        assert!(matches!(validate_password("short"), Err(PasswordError::TooShort)));
        assert!(validate_password("12345678").is_ok());
    }

    #[tokio::test]
    async fn test_hash_and_verify_on_blocking_pool() {
        let hash = spawn_hash_password("off_thread_password".to_string()).await.unwrap();
        assert!(spawn_verify_password("off_thread_password".to_string(), hash.clone()).await.unwrap());
        assert!(!spawn_verify_password("other_password".to_string(), hash).await.unwrap());
        assert!(matches!(spawn_hash_password("short".to_string()).await, Err(PasswordError::TooShort)));
    }

    #[test]
    fn test_too_short_message() {
        assert_eq!(PasswordError::TooShort.to_string(), "password must be at least 8 characters");
    }

    #[test]
    fn test_hash_long_password() {
        let password = "a".repeat(1000);
        let hash = hash_password(&password).unwrap();
        assert!(verify_password(&password, &hash).unwrap());
    }

    #[test]
    fn test_hash_unicode_password() {
        let password = "🔐密码测试🔑安全";
        let hash = hash_password(password).unwrap();
        assert!(verify_password(password, &hash).unwrap());
    }
}
