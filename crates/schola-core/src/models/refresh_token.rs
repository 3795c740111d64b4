//! Refresh token domain model and its rotation/revocation lifecycle.
//!
//! Rows are never physically deleted; the revocation chain
//! (`revoked_reason`, `replaced_by_token`) is the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a refresh token was revoked.
///
/// Strongly typed so the persisted strings stay consistent across the
/// service and store layers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RevocationReason {
    /// Consumed by the normal refresh flow; a successor was issued.
    Rotated,
    /// User-initiated logout.
    Logout,
}

impl RevocationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationReason::Rotated => "Replaced by new token",
            RevocationReason::Logout => "User logout",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Replaced by new token" => Some(RevocationReason::Rotated),
            "User logout" => Some(RevocationReason::Logout),
            _ => None,
        }
    }
}

impl std::fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted refresh token record.
///
/// The `token_hash` column holds the SHA-256 of the opaque value; the raw
/// value is returned to the client exactly once and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub created_by_ip: Option<String>,
    pub user_agent: Option<String>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<RevocationReason>,
    /// Hash of the successor token, set exactly once at rotation.
    pub replaced_by_token: Option<String>,
}

impl RefreshToken {
    /// A token is active iff it has not been revoked and has not expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && now < self.expires_at
    }

    /// Pure state transition: the record after a revocation is applied.
    ///
    /// Persistence of this transition must go through
    /// [`RefreshTokenRepository::revoke_active`] so the conditional update
    /// decides the winner under concurrent rotation.
    ///
    /// [`RefreshTokenRepository::revoke_active`]: crate::repository::RefreshTokenRepository::revoke_active
    pub fn revoked(self, revocation: &TokenRevocation) -> Self {
        Self {
            is_revoked: true,
            revoked_at: Some(revocation.revoked_at),
            revoked_reason: Some(revocation.reason),
            replaced_by_token: revocation.replaced_by_token.clone(),
            ..self
        }
    }
}

/// Input for persisting a freshly minted refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_by_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// The persistence command for a revocation.
///
/// Built by one of the two constructors so every revocation carries a
/// canonical reason, then consumed by the store's conditional update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRevocation {
    pub revoked_at: DateTime<Utc>,
    pub reason: RevocationReason,
    /// Hash of the successor token; present only for rotation.
    pub replaced_by_token: Option<String>,
}

impl TokenRevocation {
    /// Revocation caused by the refresh flow superseding this token.
    pub fn rotation(now: DateTime<Utc>, successor_hash: String) -> Self {
        Self {
            revoked_at: now,
            reason: RevocationReason::Rotated,
            replaced_by_token: Some(successor_hash),
        }
    }

    /// Revocation caused by an explicit logout.
    pub fn logout(now: DateTime<Utc>) -> Self {
        Self {
            revoked_at: now,
            reason: RevocationReason::Logout,
            replaced_by_token: None,
        }
    }
}
