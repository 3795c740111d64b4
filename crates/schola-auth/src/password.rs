//! Password verification using Argon2id.
//!
//! Hashing happens in the persistence layer when a user is created; the
//! auth flow only ever verifies. The scheme is treated as an opaque
//! capability — nothing here inspects hash parameters.

use argon2::{Argon2, PasswordVerifier};

use crate::error::AuthError;

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// When a pepper is configured it is prepended to the password, matching
/// what the store did at hashing time. `Ok(false)` means the password
/// simply did not match; `Err` means the stored hash is unusable.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("stored password hash is malformed: {e}")))?;

    match Argon2::default().verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("password verification: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::PasswordHasher;
    use argon2::password_hash::SaltString;
    use argon2::password_hash::rand_core::OsRng;

    fn hash(password: &str, pepper: Option<&str>) -> String {
        let peppered: String;
        let input = match pepper {
            Some(p) => {
                peppered = format!("{p}{password}");
                peppered.as_bytes()
            }
            None => password.as_bytes(),
        };
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(input, &salt)
            .expect("hashing failed")
            .to_string()
    }

    #[test]
    fn matching_password_verifies() {
        let h = hash("plaid-zebra-42", None);
        assert!(verify_password("plaid-zebra-42", &h, None).unwrap());
    }

    #[test]
    fn mismatch_is_ok_false_not_error() {
        let h = hash("plaid-zebra-42", None);
        assert!(!verify_password("wrong", &h, None).unwrap());
    }

    #[test]
    fn pepper_must_match_hash_time_pepper() {
        let h = hash("plaid-zebra-42", Some("!s3cret"));
        assert!(verify_password("plaid-zebra-42", &h, Some("!s3cret")).unwrap());
        assert!(!verify_password("plaid-zebra-42", &h, None).unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(verify_password("pw", "$argon2id$garbage", None).is_err());
    }
}
