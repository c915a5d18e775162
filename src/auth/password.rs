/// Password Hashing and Verification
///
/// Irreversible salted hashing with bcrypt. Both calls are CPU-bound and slow
/// on purpose; async callers go through the `*_blocking` wrappers.

use bcrypt::{hash, verify};
use lazy_static::lazy_static;

use crate::error::{AppError, ValidationError};

/// bcrypt cost factor (2^10 rounds)
const HASH_COST: u32 = 10;
const MAX_PASSWORD_LENGTH: usize = 128;

lazy_static! {
    // Stand-in hash for logins against unknown emails
    static ref DUMMY_HASH: Option<String> = hash("movie-api-unknown-user", HASH_COST).ok();
}

/// Hash a password using bcrypt
///
/// # Errors
/// Returns error if the password is too long or bcrypt fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        )));
    }

    hash(password, HASH_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// # Errors
/// Returns error only if the stored hash is unreadable
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

/// `hash_password` on the blocking pool
pub async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

/// `verify_password` on the blocking pool
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?
}

/// Run one bcrypt verify against a fixed hash and discard the result, so an
/// unknown email costs as much as a wrong password.
pub async fn verify_dummy_blocking(password: String) -> Result<(), AppError> {
    tokio::task::spawn_blocking(move || {
        if let Some(dummy) = DUMMY_HASH.as_deref() {
            let _ = verify(&password, dummy);
        }
    })
    .await?;
    Ok(())
}
