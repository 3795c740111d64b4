//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Lookups return `Option` rather
//! than a not-found error so callers decide how absence surfaces (the
//! auth layer must not leak which lookup failed).

use uuid::Uuid;

use crate::error::ScholaResult;
use crate::models::refresh_token::{CreateRefreshToken, RefreshToken, TokenRevocation};
use crate::models::user::{CreateUser, UpdateUser, User};

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = ScholaResult<User>> + Send;

    fn find_by_id(&self, id: Uuid) -> impl Future<Output = ScholaResult<Option<User>>> + Send;

    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = ScholaResult<Option<User>>> + Send;

    /// Partial update; two-factor secret fields follow the
    /// set/clear/unchanged convention documented on [`UpdateUser`].
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = ScholaResult<User>> + Send;
}

pub trait RefreshTokenRepository: Send + Sync {
    fn add(
        &self,
        input: CreateRefreshToken,
    ) -> impl Future<Output = ScholaResult<RefreshToken>> + Send;

    fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = ScholaResult<Option<RefreshToken>>> + Send;

    /// Atomically apply `revocation` to the token iff it is still active
    /// (not revoked, not expired). Returns the revoked record, or `None`
    /// when no active row matched — unknown hash, expired, already
    /// revoked, or a concurrent caller won the race.
    ///
    /// Implementations must express the active check and the write as a
    /// single conditional update so that, of any set of concurrent calls
    /// for one token, exactly one succeeds.
    fn revoke_active(
        &self,
        token_hash: &str,
        revocation: TokenRevocation,
    ) -> impl Future<Output = ScholaResult<Option<RefreshToken>>> + Send;
}
