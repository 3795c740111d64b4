//! Two-factor orchestration: the pure domain service over the TOTP
//! provider, and the stateful setup/confirm/verify lifecycle against the
//! user record.
//!
//! Secret lifecycle: a user has no secret, a pending secret, or a
//! confirmed secret. A pending secret is promoted to confirmed only by a
//! correct code proof; both are stored encrypted.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use schola_core::error::{ScholaError, ScholaResult};
use schola_core::models::user::{UpdateUser, User};
use schola_core::repository::UserRepository;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::secret::SecretCipher;
use crate::totp::TotpProvider;

const RECOVERY_CODE_COUNT: usize = 8;
const RECOVERY_CODE_LENGTH: usize = 10;
/// Lowercase alphanumerics minus the lookalikes (i, l, o, 0, 1).
const RECOVERY_CODE_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";

/// Everything a client needs to enroll an authenticator app. The
/// plaintext secret doubles as the manual-entry key; it is never
/// persisted in this form.
#[derive(Debug, Clone)]
pub struct TwoFactorSetup {
    pub secret: String,
    pub otpauth_uri: String,
    pub qr_png_base64: String,
}

/// Pure two-factor operations — no persistence, independently testable.
#[derive(Debug, Clone)]
pub struct TwoFactorEngine {
    provider: TotpProvider,
}

impl TwoFactorEngine {
    pub fn new(provider: TotpProvider) -> Self {
        Self { provider }
    }

    /// Generate a fresh secret and its provisioning artifacts.
    pub fn generate_setup(&self, account_label: &str) -> Result<TwoFactorSetup, AuthError> {
        let secret = self.provider.generate_secret();
        let artifacts = self.provider.setup_artifacts(account_label, &secret)?;
        Ok(TwoFactorSetup {
            secret,
            otpauth_uri: artifacts.otpauth_uri,
            qr_png_base64: artifacts.qr_png_base64,
        })
    }

    pub fn verify_code(&self, secret: &str, code: &str) -> bool {
        self.provider.verify_code(secret, code)
    }
}

/// Two-factor lifecycle over the user record: start setup, confirm with
/// a code proof, verify at login, redeem recovery codes.
pub struct TwoFactorService<U: UserRepository> {
    engine: TwoFactorEngine,
    cipher: SecretCipher,
    user_repo: U,
}

impl<U: UserRepository> TwoFactorService<U> {
    /// Build the service. Fails at construction when no two-factor
    /// encryption key is configured — enrollment without encrypted
    /// storage is not permitted.
    pub fn new(user_repo: U, config: &AuthConfig) -> Result<Self, AuthError> {
        let key = config.two_factor_encryption_key.ok_or_else(|| {
            AuthError::Config("two-factor encryption key is not configured".into())
        })?;

        Ok(Self {
            engine: TwoFactorEngine::new(TotpProvider::new(config)),
            cipher: SecretCipher::new(key),
            user_repo,
        })
    }

    /// Start (or restart) two-factor setup for a user.
    ///
    /// Stores the fresh secret, encrypted, as the pending secret —
    /// overwriting any prior pending secret. The confirmed secret and
    /// `two_factor_enabled` are untouched, so an abandoned restart never
    /// degrades an already-enabled account.
    pub async fn enable(&self, user_id: Uuid) -> ScholaResult<TwoFactorSetup> {
        let user = self.require_user(user_id).await?;

        let setup = self.engine.generate_setup(&user.email)?;
        let encrypted = self.cipher.encrypt(&setup.secret)?;

        self.user_repo
            .update(
                user_id,
                UpdateUser {
                    two_factor_secret_pending: Some(Some(encrypted)),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(user_id = %user_id, "two-factor setup started");
        Ok(setup)
    }

    /// Confirm setup with a code from the authenticator.
    ///
    /// On success the pending secret is promoted to confirmed, recovery
    /// codes are generated, and their plaintext is returned — this is the
    /// only time it is available. A wrong code mutates nothing.
    pub async fn confirm(&self, user_id: Uuid, code: &str) -> ScholaResult<Vec<String>> {
        let user = self.require_user(user_id).await?;

        let Some(pending) = user.two_factor_secret_pending else {
            return Err(AuthError::SetupNotStarted.into());
        };

        let secret = self.cipher.decrypt(&pending)?;
        if !self.engine.verify_code(&secret, code) {
            return Err(AuthError::InvalidCode.into());
        }

        let recovery_codes = generate_recovery_codes();
        let hashes = recovery_codes.iter().map(|c| hash_recovery_code(c)).collect();

        self.user_repo
            .update(
                user_id,
                UpdateUser {
                    two_factor_enabled: Some(true),
                    two_factor_secret: Some(Some(pending)),
                    two_factor_secret_pending: Some(None),
                    recovery_code_hashes: Some(hashes),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(user_id = %user_id, "two-factor setup confirmed");
        Ok(recovery_codes)
    }

    /// Verify a login code against the confirmed secret.
    ///
    /// Requires two-factor to be enabled; a leftover pending secret is
    /// never consulted here. Mutates no state — a code stays valid for
    /// any request within its drift window (accepted limitation, not
    /// hardened into single-use).
    pub async fn verify_login(&self, user_id: Uuid, code: &str) -> ScholaResult<()> {
        let user = self.require_user(user_id).await?;

        if !user.two_factor_enabled {
            return Err(AuthError::TwoFactorNotEnabled.into());
        }
        let Some(confirmed) = user.two_factor_secret else {
            return Err(AuthError::TwoFactorNotEnabled.into());
        };

        let secret = self.cipher.decrypt(&confirmed)?;
        if !self.engine.verify_code(&secret, code) {
            return Err(AuthError::InvalidCode.into());
        }
        Ok(())
    }

    /// Redeem a one-time recovery code.
    ///
    /// A matching code is removed from the stored hash set before
    /// returning, so it cannot be redeemed twice.
    pub async fn redeem_recovery_code(&self, user_id: Uuid, code: &str) -> ScholaResult<()> {
        let user = self.require_user(user_id).await?;

        if !user.two_factor_enabled {
            return Err(AuthError::TwoFactorNotEnabled.into());
        }

        let hash = hash_recovery_code(code);
        let mut hashes = user.recovery_code_hashes;
        let Some(position) = hashes.iter().position(|h| *h == hash) else {
            return Err(AuthError::InvalidCode.into());
        };
        hashes.remove(position);

        self.user_repo
            .update(
                user_id,
                UpdateUser {
                    recovery_code_hashes: Some(hashes),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(user_id = %user_id, "recovery code redeemed");
        Ok(())
    }

    async fn require_user(&self, user_id: Uuid) -> ScholaResult<User> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ScholaError::NotFound {
                entity: "user".into(),
                id: user_id.to_string(),
            })
    }
}

/// Generate a batch of one-time recovery codes.
fn generate_recovery_codes() -> Vec<String> {
    let mut rng = rand::rng();
    (0..RECOVERY_CODE_COUNT)
        .map(|_| {
            (0..RECOVERY_CODE_LENGTH)
                .map(|_| {
                    let index = rand::Rng::random_range(&mut rng, 0..RECOVERY_CODE_ALPHABET.len());
                    RECOVERY_CODE_ALPHABET[index] as char
                })
                .collect()
        })
        .collect()
}

/// SHA-256 of a normalized (trimmed, lowercased) recovery code,
/// hex-encoded. Only this form is persisted.
fn hash_recovery_code(code: &str) -> String {
    let normalized = code.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}
