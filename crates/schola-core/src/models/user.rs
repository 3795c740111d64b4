//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role carried into access-token claims at issuance time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    Superadmin,
    Admin,
    Teacher,
    Assistant,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "Superadmin",
            Role::Admin => "Admin",
            Role::Teacher => "Teacher",
            Role::Assistant => "Assistant",
            Role::Student => "Student",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Faculty the user belongs to.
    pub tenant_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub status: UserStatus,
    pub password_hash: String,
    /// True iff a confirmed TOTP secret exists.
    pub two_factor_enabled: bool,
    /// AES-256-GCM encrypted TOTP secret, present once setup is confirmed.
    pub two_factor_secret: Option<String>,
    /// AES-256-GCM encrypted candidate secret awaiting a code proof.
    pub two_factor_secret_pending: Option<String>,
    /// SHA-256 hashes of unredeemed recovery codes.
    pub recovery_code_hashes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Display name carried into token claims.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub tenant_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    /// Raw password (hashed with Argon2id before storage).
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub status: Option<UserStatus>,
    pub two_factor_enabled: Option<bool>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub two_factor_secret: Option<Option<String>>,
    /// Same set/clear/unchanged convention as `two_factor_secret`.
    pub two_factor_secret_pending: Option<Option<String>>,
    pub recovery_code_hashes: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_joins_first_and_last() {
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "ada@example.edu".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            role: Role::Teacher,
            status: UserStatus::Active,
            password_hash: String::new(),
            two_factor_enabled: false,
            two_factor_secret: None,
            two_factor_secret_pending: None,
            recovery_code_hashes: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(user.full_name(), "Ada Lovelace");
    }
}
