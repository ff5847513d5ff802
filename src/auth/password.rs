//! Password hashing with bcrypt

use crate::error::{ApiError, ApiResult};

/// bcrypt cost factor
const BCRYPT_WORK_FACTOR: u32 = 12;

/// Hash a plaintext password for storage
pub fn hash_password(password: &str) -> ApiResult<String> {
    bcrypt::hash(password, BCRYPT_WORK_FACTOR)
        .map_err(|e| ApiError::InternalError(format!("Password hashing failed: {}", e)))
}

/// Check a plaintext password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> ApiResult<bool> {
    bcrypt::verify(password, hash)
        .map_err(|e| ApiError::InternalError(format!("Password verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }
}
