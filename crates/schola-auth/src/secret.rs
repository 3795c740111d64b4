//! AES-256-GCM encryption of TOTP secrets at rest.
//!
//! Every write or read of a stored two-factor secret goes through
//! [`SecretCipher`]; no code path persists or compares a raw base32
//! secret.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::AuthError;

const NONCE_BYTES: usize = 12;

/// Reversible encryption of TOTP secrets with a 256-bit key.
///
/// Ciphertext format: `base64(nonce || ciphertext || tag)`, fresh random
/// 96-bit nonce per encryption. Pure and stateless; safe to share across
/// request handlers.
#[derive(Clone)]
pub struct SecretCipher {
    key: [u8; 32],
}

impl SecretCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, AuthError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let mut nonce_bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| AuthError::Crypto(format!("AES-GCM encrypt: {e}")))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(combined))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, AuthError> {
        let combined = STANDARD
            .decode(encoded)
            .map_err(|e| AuthError::Crypto(format!("base64 decode: {e}")))?;

        if combined.len() <= NONCE_BYTES {
            return Err(AuthError::Crypto("ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_BYTES);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| AuthError::Crypto(format!("AES-GCM decrypt: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| AuthError::Crypto(format!("decrypted secret is not UTF-8: {e}")))
    }
}
