//! Authentication service — login, two-factor challenge completion,
//! refresh-token rotation, and logout orchestration.

use chrono::{DateTime, Utc};

use schola_core::error::ScholaResult;
use schola_core::models::refresh_token::TokenRevocation;
use schola_core::models::user::{User, UserStatus};
use schola_core::repository::{RefreshTokenRepository, UserRepository};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token::{self, TokenClaims, TokenService};

/// Input for the login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A full token pair.
#[derive(Debug)]
pub struct AuthResult {
    /// Signed JWT access token.
    pub access_token: String,
    /// Raw opaque refresh token (returned to the client, stored hashed).
    pub refresh_token: String,
    /// Access token expiry.
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a password login.
#[derive(Debug)]
pub enum AuthOutcome {
    /// Credentials verified and no second factor required.
    Authenticated(AuthResult),
    /// Credentials verified but the account requires a TOTP code.
    /// No refresh token has been persisted yet; the client presents the
    /// challenge token together with a code to finish the login.
    TwoFactorRequired { challenge_token: String },
}

/// Authentication service.
///
/// Generic over repository implementations so the auth layer has no
/// dependency on the database crate.
pub struct AuthService<U: UserRepository, R: RefreshTokenRepository> {
    user_repo: U,
    refresh_repo: R,
    tokens: TokenService,
    pepper: Option<String>,
}

impl<U: UserRepository, R: RefreshTokenRepository> AuthService<U, R> {
    /// Build the service. Fails on an undersized signing key — the one
    /// startup-fatal condition in this core.
    pub fn new(user_repo: U, refresh_repo: R, config: &AuthConfig) -> Result<Self, AuthError> {
        Ok(Self {
            user_repo,
            refresh_repo,
            tokens: TokenService::new(config)?,
            pepper: config.pepper.clone(),
        })
    }

    /// Authenticate with email + password.
    ///
    /// An unknown email and a wrong password produce the same error, so
    /// responses cannot be used to enumerate accounts. The deactivation
    /// check runs only after the credentials themselves are verified.
    pub async fn authenticate(&self, input: LoginInput) -> ScholaResult<AuthOutcome> {
        let user = self
            .user_repo
            .find_by_email(&input.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let valid =
            password::verify_password(&input.password, &user.password_hash, self.pepper.as_deref())?;
        if !valid {
            return Err(AuthError::InvalidCredentials.into());
        }

        if user.status == UserStatus::Inactive {
            return Err(AuthError::AccountDeactivated.into());
        }

        if user.two_factor_enabled {
            let challenge_token = self.tokens.generate_challenge_token(user.id)?;
            tracing::info!(user_id = %user.id, "login pending two-factor verification");
            return Ok(AuthOutcome::TwoFactorRequired { challenge_token });
        }

        let result = self
            .issue_pair(&user, input.ip_address, input.user_agent)
            .await?;
        tracing::info!(user_id = %user.id, "user signed in");
        Ok(AuthOutcome::Authenticated(result))
    }

    /// Validate a challenge token and return the user it belongs to,
    /// without issuing anything. Controllers use this to know which
    /// user's second factor to verify.
    pub fn verify_challenge(&self, challenge_token: &str) -> Result<uuid::Uuid, AuthError> {
        self.tokens.validate_challenge_token(challenge_token)
    }

    /// Finish a two-factor login by redeeming the challenge token.
    ///
    /// The caller must have verified the submitted TOTP code (or recovery
    /// code) via the two-factor service first; this step only proves the
    /// password half happened recently and issues the pair.
    pub async fn complete_two_factor(
        &self,
        challenge_token: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> ScholaResult<AuthResult> {
        let user_id = self.tokens.validate_challenge_token(challenge_token)?;

        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidChallenge)?;
        if user.status == UserStatus::Inactive {
            return Err(AuthError::AccountDeactivated.into());
        }

        let result = self.issue_pair(&user, ip_address, user_agent).await?;
        tracing::info!(user_id = %user.id, "user signed in (two-factor)");
        Ok(result)
    }

    /// Rotate a refresh token: revoke the presented one and issue a new
    /// pair. Each token is redeemable exactly once — of any concurrent
    /// calls presenting the same value, one wins the conditional revoke
    /// and every other caller sees the uniform invalid-token error.
    pub async fn refresh(
        &self,
        raw_refresh_token: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> ScholaResult<AuthResult> {
        let token_hash = token::hash_refresh_token(raw_refresh_token);
        let now = Utc::now();

        let existing = self
            .refresh_repo
            .find_by_token_hash(&token_hash)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;
        if !existing.is_active(now) {
            return Err(AuthError::InvalidRefreshToken.into());
        }

        let user = self
            .user_repo
            .find_by_id(existing.user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;
        if user.status == UserStatus::Inactive {
            return Err(AuthError::AccountDeactivated.into());
        }

        // Mint the successor first so the revocation can link to it, then
        // let the conditional update decide the winner under concurrency.
        let minted = self
            .tokens
            .mint_refresh_token(user.id, ip_address, user_agent);
        let revocation = TokenRevocation::rotation(now, minted.record.token_hash.clone());

        let revoked = self
            .refresh_repo
            .revoke_active(&token_hash, revocation)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        self.refresh_repo.add(minted.record).await?;

        let access_token = self
            .tokens
            .generate_access_token(&TokenClaims::for_user(&user))?;

        tracing::info!(
            user_id = %user.id,
            revoked_token_id = %revoked.id,
            "refresh token rotated"
        );

        Ok(AuthResult {
            access_token,
            refresh_token: minted.raw_token,
            expires_at: self.tokens.access_token_expiry(now),
        })
    }

    /// Logout: revoke the refresh token if it is still active.
    ///
    /// Idempotent — an unknown, expired, or already-revoked token is a
    /// no-op, and an earlier revocation reason is never overwritten.
    pub async fn revoke(&self, raw_refresh_token: &str) -> ScholaResult<()> {
        let token_hash = token::hash_refresh_token(raw_refresh_token);
        let revocation = TokenRevocation::logout(Utc::now());

        if let Some(revoked) = self.refresh_repo.revoke_active(&token_hash, revocation).await? {
            tracing::info!(
                user_id = %revoked.user_id,
                token_id = %revoked.id,
                "refresh token revoked on logout"
            );
        }
        Ok(())
    }

    /// Validate an access token and return its claims.
    ///
    /// Stateless; uniform error on any failure.
    pub fn validate_access_token(
        &self,
        token: &str,
    ) -> Result<crate::token::AccessTokenClaims, AuthError> {
        self.tokens.validate_access_token(token)
    }

    async fn issue_pair(
        &self,
        user: &User,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> ScholaResult<AuthResult> {
        let now = Utc::now();
        let minted = self
            .tokens
            .mint_refresh_token(user.id, ip_address, user_agent);
        self.refresh_repo.add(minted.record).await?;

        let access_token = self
            .tokens
            .generate_access_token(&TokenClaims::for_user(user))?;

        Ok(AuthResult {
            access_token,
            refresh_token: minted.raw_token,
            expires_at: self.tokens.access_token_expiry(now),
        })
    }
}
