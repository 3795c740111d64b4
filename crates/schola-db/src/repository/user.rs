//! SurrealDB implementation of [`UserRepository`].
//!
//! Password hashing uses Argon2id with OWASP-recommended parameters
//! (memory: 19 MiB, iterations: 2, parallelism: 1). Salt is randomly
//! generated per hash. An optional pepper (server-side secret) can be
//! provided at construction time.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use schola_core::error::ScholaResult;
use schola_core::models::user::{CreateUser, Role, UpdateUser, User, UserStatus};
use schola_core::repository::UserRepository;

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct UserRow {
    tenant_id: String,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    status: String,
    password_hash: String,
    two_factor_enabled: bool,
    two_factor_secret: Option<String>,
    two_factor_secret_pending: Option<String>,
    recovery_code_hashes: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    tenant_id: String,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    status: String,
    password_hash: String,
    two_factor_enabled: bool,
    two_factor_secret: Option<String>,
    two_factor_secret_pending: Option<String>,
    recovery_code_hashes: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_role(s: &str) -> Result<Role, DbError> {
    match s {
        "Superadmin" => Ok(Role::Superadmin),
        "Admin" => Ok(Role::Admin),
        "Teacher" => Ok(Role::Teacher),
        "Assistant" => Ok(Role::Assistant),
        "Student" => Ok(Role::Student),
        other => Err(DbError::CorruptRow(format!("unknown role: {other}"))),
    }
}

fn parse_status(s: &str) -> Result<UserStatus, DbError> {
    match s {
        "Active" => Ok(UserStatus::Active),
        "Inactive" => Ok(UserStatus::Inactive),
        other => Err(DbError::CorruptRow(format!("unknown user status: {other}"))),
    }
}

fn status_to_string(s: &UserStatus) -> &'static str {
    match s {
        UserStatus::Active => "Active",
        UserStatus::Inactive => "Inactive",
    }
}

impl UserRow {
    fn into_user(self, id: Uuid) -> Result<User, DbError> {
        let tenant_id = Uuid::parse_str(&self.tenant_id)
            .map_err(|e| DbError::CorruptRow(format!("invalid tenant UUID: {e}")))?;
        Ok(User {
            id,
            tenant_id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            role: parse_role(&self.role)?,
            status: parse_status(&self.status)?,
            password_hash: self.password_hash,
            two_factor_enabled: self.two_factor_enabled,
            two_factor_secret: self.two_factor_secret,
            two_factor_secret_pending: self.two_factor_secret_pending,
            recovery_code_hashes: self.recovery_code_hashes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::CorruptRow(format!("invalid UUID: {e}")))?;
        let tenant_id = Uuid::parse_str(&self.tenant_id)
            .map_err(|e| DbError::CorruptRow(format!("invalid tenant UUID: {e}")))?;
        Ok(User {
            id,
            tenant_id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            role: parse_role(&self.role)?,
            status: parse_status(&self.status)?,
            password_hash: self.password_hash,
            two_factor_enabled: self.two_factor_enabled,
            two_factor_secret: self.two_factor_secret,
            two_factor_secret_pending: self.two_factor_secret_pending,
            recovery_code_hashes: self.recovery_code_hashes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Hash a password with Argon2id using OWASP-recommended parameters.
///
/// If a pepper is provided, it is prepended to the password before
/// hashing. The salt is randomly generated for each call.
fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    // OWASP ASVS recommended: m=19456 (19 MiB), t=2, p=1
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Hashing(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| DbError::Hashing(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    /// Optional server-side pepper for password hashing.
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> ScholaResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 tenant_id = $tenant_id, \
                 email = $email, \
                 first_name = $first_name, last_name = $last_name, \
                 role = $role, status = $status, \
                 password_hash = $password_hash, \
                 two_factor_enabled = false, \
                 two_factor_secret = NONE, \
                 two_factor_secret_pending = NONE, \
                 recovery_code_hashes = []",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("email", input.email))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .bind(("role", input.role.as_str().to_string()))
            .bind(("status", "Active".to_string()))
            .bind(("password_hash", password_hash))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn find_by_id(&self, id: Uuid) -> ScholaResult<Option<User>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('user', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_user(id)?)),
            None => Ok(None),
        }
    }

    async fn find_by_email(&self, email: &str) -> ScholaResult<Option<User>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE email = $email",
            )
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_user()?)),
            None => Ok(None),
        }
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> ScholaResult<User> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.status.is_some() {
            sets.push("status = $status");
        }
        if input.two_factor_enabled.is_some() {
            sets.push("two_factor_enabled = $two_factor_enabled");
        }
        if input.two_factor_secret.is_some() {
            sets.push("two_factor_secret = $two_factor_secret");
        }
        if input.two_factor_secret_pending.is_some() {
            sets.push("two_factor_secret_pending = $two_factor_secret_pending");
        }
        if input.recovery_code_hashes.is_some() {
            sets.push("recovery_code_hashes = $recovery_code_hashes");
        }
        sets.push("updated_at = time::now()");

        let query = format!("UPDATE type::record('user', $id) SET {}", sets.join(", "));

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(ref status) = input.status {
            builder = builder.bind(("status", status_to_string(status).to_string()));
        }
        if let Some(two_factor_enabled) = input.two_factor_enabled {
            builder = builder.bind(("two_factor_enabled", two_factor_enabled));
        }
        if let Some(two_factor_secret) = input.two_factor_secret {
            // Option<Option<String>>: Some(Some(v)) = set, Some(None) = clear
            builder = builder.bind(("two_factor_secret", two_factor_secret));
        }
        if let Some(two_factor_secret_pending) = input.two_factor_secret_pending {
            builder = builder.bind(("two_factor_secret_pending", two_factor_secret_pending));
        }
        if let Some(recovery_code_hashes) = input.recovery_code_hashes {
            builder = builder.bind(("recovery_code_hashes", recovery_code_hashes));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }
}
