//! JWT access/challenge token issuance and validation, and opaque
//! refresh token minting.
//!
//! Access tokens are HS256-signed and stateless. Refresh tokens are
//! opaque random values; only their SHA-256 hash is ever persisted.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use schola_core::models::refresh_token::CreateRefreshToken;
use schola_core::models::user::{Role, User};

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Minimum HS256 signing key length in bytes (256 bits).
const MIN_SIGNING_KEY_BYTES: usize = 32;

/// Entropy of the opaque refresh token value in bytes.
const REFRESH_TOKEN_BYTES: usize = 64;

/// Purpose marker carried by two-factor challenge tokens.
const CHALLENGE_PURPOSE: &str = "two_factor_challenge";

/// Facts about a user captured at issuance time.
///
/// Role and tenant are snapshots of the user record when the token was
/// minted; they are never recomputed from the token itself.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub full_name: String,
    /// Faculty the user belongs to.
    pub tenant_id: Uuid,
}

impl TokenClaims {
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            full_name: user.full_name(),
            tenant_id: user.tenant_id,
        }
    }
}

/// Wire-format claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject — user ID (UUID string).
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub full_name: String,
    /// Faculty ID (UUID string).
    pub tenant_id: String,
    pub iss: String,
    pub aud: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Unique token ID (UUID string).
    pub jti: String,
}

/// Claims of the short-lived pre-auth token issued when a password login
/// hits a two-factor-enabled account. The disjoint claim shape (no
/// email/role, a `purpose` marker) keeps it from doubling as an access
/// token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChallengeClaims {
    sub: String,
    purpose: String,
    iss: String,
    aud: String,
    iat: i64,
    exp: i64,
    jti: String,
}

/// A freshly minted refresh token: the raw value for the client, and the
/// persistence-ready record carrying its hash. The caller persists the
/// record; this function has no side effects.
#[derive(Debug)]
pub struct MintedRefreshToken {
    pub raw_token: String,
    pub record: CreateRefreshToken,
}

/// Issues and validates signed tokens and mints refresh tokens.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    access_lifetime: Duration,
    challenge_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenService {
    /// Build the service from configuration.
    ///
    /// Fails if the signing key is shorter than 256 bits — an operator
    /// error that must surface at startup, never per-request.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let key = config.jwt_signing_key.as_bytes();
        if key.len() < MIN_SIGNING_KEY_BYTES {
            return Err(AuthError::Config(format!(
                "JWT signing key must be at least {MIN_SIGNING_KEY_BYTES} bytes, got {}",
                key.len()
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            access_lifetime: Duration::seconds(config.access_token_lifetime_secs as i64),
            challenge_lifetime: Duration::seconds(config.challenge_lifetime_secs as i64),
            refresh_lifetime: Duration::days(config.refresh_token_lifetime_days),
        })
    }

    /// Expiry instant of an access token issued right now.
    pub fn access_token_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.access_lifetime
    }

    /// Issue a signed HS256 access token for the given claims.
    pub fn generate_access_token(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        let now = Utc::now();
        let wire = AccessTokenClaims {
            sub: claims.user_id.to_string(),
            email: claims.email.clone(),
            role: claims.role,
            full_name: claims.full_name.clone(),
            tenant_id: claims.tenant_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + self.access_lifetime).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &wire, &self.encoding_key)
            .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
    }

    /// Verify an access token's signature, issuer, audience, and expiry
    /// (zero clock-skew tolerance).
    ///
    /// Fails closed: every failure collapses to the same error, so
    /// callers cannot distinguish an expired token from a forged one.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        jsonwebtoken::decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidAccessToken)
    }

    /// Issue the short-lived pre-auth token for the two-factor step-up.
    pub fn generate_challenge_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        let now = Utc::now();
        let wire = ChallengeClaims {
            sub: user_id.to_string(),
            purpose: CHALLENGE_PURPOSE.into(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + self.challenge_lifetime).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &wire, &self.encoding_key)
            .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
    }

    /// Validate a challenge token and return the user it was issued for.
    pub fn validate_challenge_token(&self, token: &str) -> Result<Uuid, AuthError> {
        let claims =
            jsonwebtoken::decode::<ChallengeClaims>(token, &self.decoding_key, &self.validation())
                .map(|data| data.claims)
                .map_err(|_| AuthError::InvalidChallenge)?;

        if claims.purpose != CHALLENGE_PURPOSE {
            return Err(AuthError::InvalidChallenge);
        }

        Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidChallenge)
    }

    /// Mint a new opaque refresh token for `user_id`.
    pub fn mint_refresh_token(
        &self,
        user_id: Uuid,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> MintedRefreshToken {
        let mut rng = rand::rng();
        let bytes: [u8; REFRESH_TOKEN_BYTES] = rand::Rng::random(&mut rng);
        let raw_token = URL_SAFE_NO_PAD.encode(bytes);

        let record = CreateRefreshToken {
            user_id,
            token_hash: hash_refresh_token(&raw_token),
            expires_at: Utc::now() + self.refresh_lifetime,
            created_by_ip: ip_address,
            user_agent,
        };

        MintedRefreshToken { raw_token, record }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);
        validation
    }
}

/// SHA-256 hash of a raw refresh token, hex-encoded.
///
/// This is the only representation of the token that reaches storage.
pub fn hash_refresh_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "an-hs256-test-key-of-sufficient-length!!";

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_signing_key: TEST_KEY.into(),
            jwt_issuer: "schola-test".into(),
            jwt_audience: "schola-test-clients".into(),
            ..AuthConfig::default()
        }
    }

    fn test_claims() -> TokenClaims {
        TokenClaims {
            user_id: Uuid::new_v4(),
            email: "ada@example.edu".into(),
            role: Role::Teacher,
            full_name: "Ada Lovelace".into(),
            tenant_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn short_signing_key_is_rejected_at_construction() {
        let config = AuthConfig {
            jwt_signing_key: "way-too-short".into(),
            ..AuthConfig::default()
        };
        assert!(matches!(
            TokenService::new(&config),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn access_token_roundtrip() {
        let svc = TokenService::new(&test_config()).unwrap();
        let claims = test_claims();

        let token = svc.generate_access_token(&claims).unwrap();
        let decoded = svc.validate_access_token(&token).unwrap();

        assert_eq!(decoded.sub, claims.user_id.to_string());
        assert_eq!(decoded.email, "ada@example.edu");
        assert_eq!(decoded.role, Role::Teacher);
        assert_eq!(decoded.full_name, "Ada Lovelace");
        assert_eq!(decoded.tenant_id, claims.tenant_id.to_string());
        assert_eq!(decoded.iss, "schola-test");
        assert_eq!(decoded.aud, "schola-test-clients");
    }

    #[test]
    fn jti_is_unique_per_issuance() {
        let svc = TokenService::new(&test_config()).unwrap();
        let claims = test_claims();

        let c1 = svc
            .validate_access_token(&svc.generate_access_token(&claims).unwrap())
            .unwrap();
        let c2 = svc
            .validate_access_token(&svc.generate_access_token(&claims).unwrap())
            .unwrap();
        assert_ne!(c1.jti, c2.jti);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = TokenService::new(&test_config()).unwrap();
        let token = svc.generate_access_token(&test_claims()).unwrap();
        let tampered = format!("{token}x");
        assert!(matches!(
            svc.validate_access_token(&tampered),
            Err(AuthError::InvalidAccessToken)
        ));
    }

    #[test]
    fn wrong_issuer_is_rejected_uniformly() {
        let svc = TokenService::new(&test_config()).unwrap();
        let other = TokenService::new(&AuthConfig {
            jwt_issuer: "someone-else".into(),
            ..test_config()
        })
        .unwrap();

        let token = other.generate_access_token(&test_claims()).unwrap();
        assert!(matches!(
            svc.validate_access_token(&token),
            Err(AuthError::InvalidAccessToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected_with_zero_leeway() {
        let svc = TokenService::new(&test_config()).unwrap();

        // Craft a token whose exp is firmly in the past.
        let now = Utc::now();
        let wire = AccessTokenClaims {
            sub: Uuid::new_v4().to_string(),
            email: "ada@example.edu".into(),
            role: Role::Student,
            full_name: "Ada Lovelace".into(),
            tenant_id: Uuid::new_v4().to_string(),
            iss: "schola-test".into(),
            aud: "schola-test-clients".into(),
            iat: (now - Duration::minutes(20)).timestamp(),
            exp: (now - Duration::minutes(5)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &wire,
            &EncodingKey::from_secret(TEST_KEY.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            svc.validate_access_token(&token),
            Err(AuthError::InvalidAccessToken)
        ));
    }

    #[test]
    fn challenge_token_roundtrip() {
        let svc = TokenService::new(&test_config()).unwrap();
        let user_id = Uuid::new_v4();

        let token = svc.generate_challenge_token(user_id).unwrap();
        assert_eq!(svc.validate_challenge_token(&token).unwrap(), user_id);
    }

    #[test]
    fn challenge_token_is_not_an_access_token() {
        let svc = TokenService::new(&test_config()).unwrap();
        let challenge = svc.generate_challenge_token(Uuid::new_v4()).unwrap();
        assert!(matches!(
            svc.validate_access_token(&challenge),
            Err(AuthError::InvalidAccessToken)
        ));
    }

    #[test]
    fn access_token_is_not_a_challenge_token() {
        let svc = TokenService::new(&test_config()).unwrap();
        let access = svc.generate_access_token(&test_claims()).unwrap();
        assert!(matches!(
            svc.validate_challenge_token(&access),
            Err(AuthError::InvalidChallenge)
        ));
    }

    #[test]
    fn refresh_token_is_url_safe_base64_of_64_bytes() {
        let svc = TokenService::new(&test_config()).unwrap();
        let minted = svc.mint_refresh_token(Uuid::new_v4(), None, None);

        // 64 bytes → 86 base64url chars, no padding.
        assert_eq!(minted.raw_token.len(), 86);
        assert!(
            minted
                .raw_token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_eq!(minted.record.token_hash, hash_refresh_token(&minted.raw_token));
    }

    #[test]
    fn minted_tokens_are_unique() {
        let svc = TokenService::new(&test_config()).unwrap();
        let a = svc.mint_refresh_token(Uuid::new_v4(), None, None);
        let b = svc.mint_refresh_token(Uuid::new_v4(), None, None);
        assert_ne!(a.raw_token, b.raw_token);
        assert_ne!(a.record.token_hash, b.record.token_hash);
    }

    #[test]
    fn refresh_token_hash_is_deterministic() {
        assert_eq!(hash_refresh_token("value"), hash_refresh_token("value"));
        assert_ne!(hash_refresh_token("value"), hash_refresh_token("other"));
    }

    #[test]
    fn refresh_token_expiry_uses_configured_days() {
        let svc = TokenService::new(&test_config()).unwrap();
        let minted = svc.mint_refresh_token(Uuid::new_v4(), None, None);
        let days = (minted.record.expires_at - Utc::now()).num_days();
        assert!((6..=7).contains(&days));
    }
}
