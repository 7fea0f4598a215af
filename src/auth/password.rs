use crate::error::AppError;
use log::warn;

/// Minimum accepted password length, shared with signup validation.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Hashes a password with bcrypt at the default cost.
///
/// Rejects passwords shorter than [`MIN_PASSWORD_LENGTH`] before doing any
/// work; a hashing-library failure is an internal error.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// Checks a password against a stored bcrypt hash.
///
/// Mismatches and malformed hashes both come back as `false`. A stored hash
/// this subsystem cannot parse must fail authentication, not surface an
/// error the caller could confuse with a store outage.
pub fn verify_password(password: &str, hashed_password: &str) -> bool {
    match bcrypt::verify(password, hashed_password) {
        Ok(matches) => matches,
        Err(error) => {
            warn!("password verification failed on a malformed hash: {}", error);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing_and_verification() {
        let password = "test_password123";
        let hashed = hash_password(password).unwrap();

        assert!(verify_password(password, &hashed));
        assert!(!verify_password("wrong_password", &hashed));
    }

    #[test]
    fn test_short_password_rejected_before_hashing() {
        match hash_password("12345") {
            Err(AppError::Validation(msg)) => {
                assert!(msg.contains("at least 6"));
            }
            other => panic!("expected a validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_verify_with_invalid_hash() {
        assert!(!verify_password("test_password123", "invalidhashformat"));
        assert!(!verify_password("test_password123", ""));
    }
}
