//! Integration tests for the SurrealDB repository implementations.

use chrono::{Duration, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

use schola_core::models::refresh_token::{CreateRefreshToken, RevocationReason, TokenRevocation};
use schola_core::models::user::{CreateUser, Role, UpdateUser, UserStatus};
use schola_core::repository::{RefreshTokenRepository, UserRepository};
use schola_db::{SurrealRefreshTokenRepository, SurrealUserRepository, run_migrations};

async fn setup() -> (
    SurrealUserRepository<surrealdb::engine::local::Db>,
    SurrealRefreshTokenRepository<surrealdb::engine::local::Db>,
) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    run_migrations(&db).await.unwrap();

    (
        SurrealUserRepository::new(db.clone()),
        SurrealRefreshTokenRepository::new(db),
    )
}

fn sample_user() -> CreateUser {
    CreateUser {
        tenant_id: Uuid::new_v4(),
        email: "grace@example.edu".into(),
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        role: Role::Admin,
        password: "correct-horse-battery".into(),
    }
}

fn sample_token(user_id: Uuid, hash: &str, expires_in: Duration) -> CreateRefreshToken {
    CreateRefreshToken {
        user_id,
        token_hash: hash.into(),
        expires_at: Utc::now() + expires_in,
        created_by_ip: Some("127.0.0.1".into()),
        user_agent: Some("TestAgent".into()),
    }
}

#[tokio::test]
async fn create_user_hashes_password_and_defaults() {
    let (users, _) = setup().await;

    let user = users.create(sample_user()).await.unwrap();

    assert_eq!(user.email, "grace@example.edu");
    assert_eq!(user.status, UserStatus::Active);
    assert_eq!(user.role, Role::Admin);
    assert!(!user.two_factor_enabled);
    assert!(user.two_factor_secret.is_none());
    assert!(user.two_factor_secret_pending.is_none());
    assert!(user.recovery_code_hashes.is_empty());
    assert_ne!(user.password_hash, "correct-horse-battery");
    assert!(user.password_hash.starts_with("$argon2id$"));
}

#[tokio::test]
async fn find_by_email_and_id() {
    let (users, _) = setup().await;
    let created = users.create(sample_user()).await.unwrap();

    let by_email = users
        .find_by_email("grace@example.edu")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email.id, created.id);

    let by_id = users.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(by_id.email, created.email);

    assert!(users.find_by_email("nobody@example.edu").await.unwrap().is_none());
    assert!(users.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn two_factor_fields_follow_set_and_clear_semantics() {
    let (users, _) = setup().await;
    let created = users.create(sample_user()).await.unwrap();

    // Stage a pending secret.
    let staged = users
        .update(
            created.id,
            UpdateUser {
                two_factor_secret_pending: Some(Some("encrypted-pending".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        staged.two_factor_secret_pending.as_deref(),
        Some("encrypted-pending")
    );
    assert!(!staged.two_factor_enabled);
    assert!(staged.two_factor_secret.is_none());

    // Promote: pending becomes confirmed, pending cleared.
    let promoted = users
        .update(
            created.id,
            UpdateUser {
                two_factor_enabled: Some(true),
                two_factor_secret: Some(Some("encrypted-pending".into())),
                two_factor_secret_pending: Some(None),
                recovery_code_hashes: Some(vec!["hash-a".into(), "hash-b".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(promoted.two_factor_enabled);
    assert_eq!(promoted.two_factor_secret.as_deref(), Some("encrypted-pending"));
    assert!(promoted.two_factor_secret_pending.is_none());
    assert_eq!(promoted.recovery_code_hashes.len(), 2);
}

#[tokio::test]
async fn status_update_deactivates_user() {
    let (users, _) = setup().await;
    let created = users.create(sample_user()).await.unwrap();

    let updated = users
        .update(
            created.id,
            UpdateUser {
                status: Some(UserStatus::Inactive),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, UserStatus::Inactive);
}

#[tokio::test]
async fn add_and_find_refresh_token() {
    let (users, tokens) = setup().await;
    let user = users.create(sample_user()).await.unwrap();

    let created = tokens
        .add(sample_token(user.id, "hash-1", Duration::days(7)))
        .await
        .unwrap();
    assert!(!created.is_revoked);
    assert!(created.is_active(Utc::now()));
    assert_eq!(created.user_id, user.id);

    let found = tokens.find_by_token_hash("hash-1").await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.created_by_ip.as_deref(), Some("127.0.0.1"));

    assert!(tokens.find_by_token_hash("hash-x").await.unwrap().is_none());
}

#[tokio::test]
async fn revoke_active_succeeds_exactly_once() {
    let (users, tokens) = setup().await;
    let user = users.create(sample_user()).await.unwrap();
    tokens
        .add(sample_token(user.id, "hash-1", Duration::days(7)))
        .await
        .unwrap();

    let now = Utc::now();
    let revoked = tokens
        .revoke_active("hash-1", TokenRevocation::rotation(now, "hash-2".into()))
        .await
        .unwrap()
        .expect("first revocation should win");

    assert!(revoked.is_revoked);
    assert_eq!(revoked.revoked_reason, Some(RevocationReason::Rotated));
    assert_eq!(revoked.replaced_by_token.as_deref(), Some("hash-2"));
    assert!(revoked.revoked_at.is_some());

    // The second attempt sees no active row.
    let second = tokens
        .revoke_active("hash-1", TokenRevocation::logout(Utc::now()))
        .await
        .unwrap();
    assert!(second.is_none());

    // And the stored reason is the original one.
    let stored = tokens.find_by_token_hash("hash-1").await.unwrap().unwrap();
    assert_eq!(stored.revoked_reason, Some(RevocationReason::Rotated));
}

#[tokio::test]
async fn revoke_active_ignores_expired_tokens() {
    let (users, tokens) = setup().await;
    let user = users.create(sample_user()).await.unwrap();
    tokens
        .add(sample_token(user.id, "hash-old", Duration::seconds(-10)))
        .await
        .unwrap();

    let result = tokens
        .revoke_active("hash-old", TokenRevocation::logout(Utc::now()))
        .await
        .unwrap();
    assert!(result.is_none());

    // The row itself survives untouched (audit trail).
    let stored = tokens.find_by_token_hash("hash-old").await.unwrap().unwrap();
    assert!(!stored.is_revoked);
}

#[tokio::test]
async fn revoke_active_unknown_hash_is_none() {
    let (_, tokens) = setup().await;
    let result = tokens
        .revoke_active("no-such-hash", TokenRevocation::logout(Utc::now()))
        .await
        .unwrap();
    assert!(result.is_none());
}
