//! Authentication configuration.

/// Configuration for the authentication and two-factor services.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Symmetric HS256 signing key. Must be at least 32 bytes;
    /// [`TokenService::new`] rejects shorter keys at construction.
    ///
    /// [`TokenService::new`]: crate::token::TokenService::new
    pub jwt_signing_key: String,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// JWT audience (`aud` claim).
    pub jwt_audience: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in days (default: 7).
    pub refresh_token_lifetime_days: i64,
    /// Two-factor challenge token lifetime in seconds (default: 300).
    pub challenge_lifetime_secs: u64,
    /// Optional pepper prepended to passwords before Argon2id verification.
    pub pepper: Option<String>,
    /// 256-bit AES-GCM key for encrypting TOTP secrets at rest.
    /// `None` disables two-factor enrollment.
    pub two_factor_encryption_key: Option<[u8; 32]>,
    /// Issuer name shown in authenticator apps.
    pub totp_issuer: String,
    /// TOTP code length (default: 6).
    pub totp_digits: usize,
    /// TOTP time step in seconds (default: 30).
    pub totp_step_secs: u64,
    /// Accepted step drift on either side of the current step (default: 1).
    pub totp_skew: u8,
    /// Generated secret length in bytes (default: 20 → 32 base32 chars).
    pub totp_secret_bytes: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_signing_key: String::new(),
            jwt_issuer: "schola".into(),
            jwt_audience: "schola-clients".into(),
            access_token_lifetime_secs: 900,
            refresh_token_lifetime_days: 7,
            challenge_lifetime_secs: 300,
            pepper: None,
            two_factor_encryption_key: None,
            totp_issuer: "Schola".into(),
            totp_digits: 6,
            totp_step_secs: 30,
            totp_skew: 1,
            totp_secret_bytes: 20,
        }
    }
}
