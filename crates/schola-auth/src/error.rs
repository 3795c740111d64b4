//! Authentication error types.
//!
//! Credential and token failures deliberately share coarse, uniform
//! messages: a caller must not be able to tell an unknown email from a
//! wrong password, nor an expired refresh token from a revoked one.

use schola_core::error::ScholaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password — one message for both.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Raised only after the credentials themselves were verified.
    #[error("user is deactivated")]
    AccountDeactivated,

    /// Refresh token absent, expired, or already revoked.
    #[error("invalid or expired refresh token")]
    InvalidRefreshToken,

    /// Access token failed validation; reason is intentionally opaque.
    #[error("invalid or expired access token")]
    InvalidAccessToken,

    /// Two-factor challenge token failed validation.
    #[error("invalid or expired challenge token")]
    InvalidChallenge,

    /// TOTP or recovery code failed verification.
    #[error("invalid verification code")]
    InvalidCode,

    /// Setup confirmation attempted with no pending secret.
    #[error("two-factor setup has not been started")]
    SetupNotStarted,

    /// Login verification attempted while two-factor is disabled.
    #[error("two-factor authentication is not enabled")]
    TwoFactorNotEnabled,

    /// Operator error detected at service construction, never per-request.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for ScholaError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::AccountDeactivated
            | AuthError::InvalidRefreshToken
            | AuthError::InvalidAccessToken
            | AuthError::InvalidChallenge
            | AuthError::InvalidCode
            | AuthError::SetupNotStarted
            | AuthError::TwoFactorNotEnabled => ScholaError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::Config(msg) => ScholaError::Internal(msg),
            AuthError::Crypto(msg) => ScholaError::Crypto(msg),
        }
    }
}
