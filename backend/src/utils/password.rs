//! Password hashing and verification.
//!
//! bcrypt with a configurable work factor. Hashing draws a fresh random salt
//! each call; verification is a boolean result and never errors on a wrong
//! password.

use crate::errors::{ServiceError, ServiceResult};
use bcrypt::{hash, verify};

/// Hashes a plaintext password before storing it in the database.
///
/// # Errors
/// Returns `ServiceError` if hashing fails
pub fn hash_password(password: &str, cost: u32) -> ServiceResult<String> {
    hash(password, cost)
        .map_err(|e| ServiceError::internal_error(format!("Password hashing failed: {}", e)))
}

/// Verifies a plaintext password against a stored hash.
///
/// # Returns
/// `true` if password matches hash, `false` otherwise
///
/// # Errors
/// Returns `ServiceError` only if the stored hash itself is malformed
pub fn verify_password(password: &str, hash: &str) -> ServiceResult<bool> {
    verify(password, hash)
        .map_err(|e| ServiceError::internal_error(format!("Password verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn verify_accepts_correct_password() {
        let hashed = hash_password("hunter2", TEST_COST).unwrap();
        assert!(verify_password("hunter2", &hashed).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hashed = hash_password("hunter2", TEST_COST).unwrap();
        assert!(!verify_password("hunter3", &hashed).unwrap());
    }

    #[test]
    fn hashing_salts_each_call() {
        let first = hash_password("hunter2", TEST_COST).unwrap();
        let second = hash_password("hunter2", TEST_COST).unwrap();
        assert_ne!(first, second);
    }
}
