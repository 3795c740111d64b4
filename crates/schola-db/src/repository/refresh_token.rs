//! SurrealDB implementation of [`RefreshTokenRepository`].
//!
//! Rows are append-only plus a one-way revocation flip; nothing here
//! deletes. The rotation guarantee lives in [`revoke_active`]: the
//! active-state check and the revocation write are one conditional
//! UPDATE statement, and a SurrealDB statement is its own transaction,
//! so concurrent rotations of the same token serialize and exactly one
//! caller gets the row back.
//!
//! [`revoke_active`]: SurrealRefreshTokenRepository::revoke_active

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use schola_core::error::ScholaResult;
use schola_core::models::refresh_token::{
    CreateRefreshToken, RefreshToken, RevocationReason, TokenRevocation,
};
use schola_core::repository::RefreshTokenRepository;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct RefreshTokenRow {
    user_id: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    created_by_ip: Option<String>,
    user_agent: Option<String>,
    is_revoked: bool,
    revoked_at: Option<DateTime<Utc>>,
    revoked_reason: Option<String>,
    replaced_by_token: Option<String>,
}

#[derive(Debug, SurrealValue)]
struct RefreshTokenRowWithId {
    record_id: String,
    user_id: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    created_by_ip: Option<String>,
    user_agent: Option<String>,
    is_revoked: bool,
    revoked_at: Option<DateTime<Utc>>,
    revoked_reason: Option<String>,
    replaced_by_token: Option<String>,
}

fn parse_reason(s: Option<String>) -> Result<Option<RevocationReason>, DbError> {
    match s {
        None => Ok(None),
        Some(raw) => RevocationReason::parse(&raw)
            .map(Some)
            .ok_or_else(|| DbError::CorruptRow(format!("unknown revocation reason: {raw}"))),
    }
}

impl RefreshTokenRow {
    fn into_token(self, id: Uuid) -> Result<RefreshToken, DbError> {
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| DbError::CorruptRow(format!("invalid user UUID: {e}")))?;
        Ok(RefreshToken {
            id,
            user_id,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            created_at: self.created_at,
            created_by_ip: self.created_by_ip,
            user_agent: self.user_agent,
            is_revoked: self.is_revoked,
            revoked_at: self.revoked_at,
            revoked_reason: parse_reason(self.revoked_reason)?,
            replaced_by_token: self.replaced_by_token,
        })
    }
}

impl RefreshTokenRowWithId {
    fn try_into_token(self) -> Result<RefreshToken, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::CorruptRow(format!("invalid UUID: {e}")))?;
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| DbError::CorruptRow(format!("invalid user UUID: {e}")))?;
        Ok(RefreshToken {
            id,
            user_id,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            created_at: self.created_at,
            created_by_ip: self.created_by_ip,
            user_agent: self.user_agent,
            is_revoked: self.is_revoked,
            revoked_at: self.revoked_at,
            revoked_reason: parse_reason(self.revoked_reason)?,
            replaced_by_token: self.replaced_by_token,
        })
    }
}

/// SurrealDB implementation of the refresh token store.
#[derive(Clone)]
pub struct SurrealRefreshTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRefreshTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RefreshTokenRepository for SurrealRefreshTokenRepository<C> {
    async fn add(&self, input: CreateRefreshToken) -> ScholaResult<RefreshToken> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('refresh_token', $id) SET \
                 user_id = $user_id, \
                 token_hash = $token_hash, \
                 expires_at = $expires_at, \
                 created_by_ip = $created_by_ip, \
                 user_agent = $user_agent, \
                 is_revoked = false, \
                 revoked_at = NONE, \
                 revoked_reason = NONE, \
                 replaced_by_token = NONE",
            )
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("token_hash", input.token_hash))
            .bind(("expires_at", input.expires_at))
            .bind(("created_by_ip", input.created_by_ip))
            .bind(("user_agent", input.user_agent))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "refresh_token".into(),
            id: id_str,
        })?;

        Ok(row.into_token(id)?)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> ScholaResult<Option<RefreshToken>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM refresh_token \
                 WHERE token_hash = $token_hash",
            )
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RefreshTokenRowWithId> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_token()?)),
            None => Ok(None),
        }
    }

    async fn revoke_active(
        &self,
        token_hash: &str,
        revocation: TokenRevocation,
    ) -> ScholaResult<Option<RefreshToken>> {
        // The WHERE clause is the compare half of the compare-and-swap:
        // only a still-active row matches, so a racing duplicate request
        // updates zero rows and gets `None`.
        let mut result = self
            .db
            .query(
                "UPDATE refresh_token SET \
                 is_revoked = true, \
                 revoked_at = $revoked_at, \
                 revoked_reason = $revoked_reason, \
                 replaced_by_token = $replaced_by_token \
                 WHERE token_hash = $token_hash \
                 AND is_revoked = false \
                 AND expires_at > $now \
                 RETURN VALUE meta::id(id)",
            )
            .bind(("token_hash", token_hash.to_string()))
            .bind(("revoked_at", revocation.revoked_at))
            .bind(("revoked_reason", revocation.reason.as_str().to_string()))
            .bind(("replaced_by_token", revocation.replaced_by_token))
            .bind(("now", revocation.revoked_at))
            .await
            .map_err(DbError::from)?;

        let ids: Vec<String> = result.take(0).map_err(DbError::from)?;
        let Some(id_str) = ids.into_iter().next() else {
            return Ok(None);
        };
        let id = Uuid::parse_str(&id_str)
            .map_err(|e| DbError::CorruptRow(format!("invalid UUID: {e}")))?;

        // Read back the row we just revoked.
        let mut result = self
            .db
            .query("SELECT * FROM type::record('refresh_token', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "refresh_token".into(),
            id: id_str,
        })?;

        Ok(Some(row.into_token(id)?))
    }
}
