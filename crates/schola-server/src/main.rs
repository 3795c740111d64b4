//! Schola Server — application entry point.

use tracing_subscriber::EnvFilter;

use schola_auth::{AuthConfig, AuthService, TwoFactorService};
use schola_db::{DbConfig, DbManager, SurrealRefreshTokenRepository, SurrealUserRepository};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("schola=info".parse().unwrap()),
        )
        .json()
        .init();

    tracing::info!("Starting Schola server...");

    let db_config = DbConfig::from_env();
    let manager = match DbManager::connect(&db_config).await {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to SurrealDB");
            std::process::exit(1);
        }
    };

    if let Err(e) = schola_db::run_migrations(manager.client()).await {
        tracing::error!(error = %e, "Failed to run migrations");
        std::process::exit(1);
    }

    let auth_config = load_auth_config();

    let user_repo = SurrealUserRepository::new(manager.client().clone());
    let refresh_repo = SurrealRefreshTokenRepository::new(manager.client().clone());

    // Construction validates the signing key; an undersized key is an
    // operator error and must stop the process here, not at request time.
    let _auth = match AuthService::new(user_repo.clone(), refresh_repo, &auth_config) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build auth service");
            std::process::exit(1);
        }
    };

    // Two-factor enrollment requires an at-rest encryption key; without
    // one the service is simply not offered.
    let _two_factor = if auth_config.two_factor_encryption_key.is_some() {
        match TwoFactorService::new(user_repo, &auth_config) {
            Ok(service) => Some(service),
            Err(e) => {
                tracing::error!(error = %e, "Failed to build two-factor service");
                std::process::exit(1);
            }
        }
    } else {
        tracing::warn!("Two-factor encryption key not set; enrollment disabled");
        None
    };

    tracing::info!("Auth core ready");

    // TODO: start the REST API layer (login/refresh/logout/2FA endpoints)

    tracing::info!("Schola server stopped.");
}

/// Load auth configuration from `SCHOLA_*` environment variables on top
/// of the defaults.
fn load_auth_config() -> AuthConfig {
    let mut config = AuthConfig::default();

    if let Ok(key) = std::env::var("SCHOLA_JWT_SIGNING_KEY") {
        config.jwt_signing_key = key;
    }
    if let Ok(issuer) = std::env::var("SCHOLA_JWT_ISSUER") {
        config.jwt_issuer = issuer;
    }
    if let Ok(audience) = std::env::var("SCHOLA_JWT_AUDIENCE") {
        config.jwt_audience = audience;
    }
    if let Ok(pepper) = std::env::var("SCHOLA_PASSWORD_PEPPER") {
        config.pepper = Some(pepper);
    }

    // 64 hex chars → 32-byte AES-256-GCM key.
    if let Ok(hex_key) = std::env::var("SCHOLA_2FA_ENCRYPTION_KEY") {
        match hex::decode(&hex_key)
            .ok()
            .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        {
            Some(key) => config.two_factor_encryption_key = Some(key),
            None => {
                tracing::error!(
                    "SCHOLA_2FA_ENCRYPTION_KEY must be 64 hex characters (32 bytes)"
                );
                std::process::exit(1);
            }
        }
    }

    config
}
