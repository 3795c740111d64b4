//! TOTP secret generation, provisioning artifacts, and code validation.

use rand::RngCore;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Provisioning artifacts for enrolling an authenticator app.
#[derive(Debug, Clone)]
pub struct SetupArtifacts {
    /// `otpauth://totp/{issuer}:{account}?secret=...&issuer=...`
    pub otpauth_uri: String,
    /// PNG rendering of the URI, base64-encoded.
    pub qr_png_base64: String,
}

/// Stateless TOTP operations: secret generation, provisioning URIs/QR
/// codes, and code validation within a bounded drift window.
#[derive(Debug, Clone)]
pub struct TotpProvider {
    issuer: String,
    digits: usize,
    step_secs: u64,
    skew: u8,
    secret_bytes: usize,
}

impl TotpProvider {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            issuer: config.totp_issuer.clone(),
            digits: config.totp_digits,
            step_secs: config.totp_step_secs,
            skew: config.totp_skew,
            secret_bytes: config.totp_secret_bytes,
        }
    }

    /// Generate a fresh random secret, base32-encoded.
    pub fn generate_secret(&self) -> String {
        let mut bytes = vec![0u8; self.secret_bytes];
        rand::rng().fill_bytes(&mut bytes);
        Secret::Raw(bytes).to_encoded().to_string()
    }

    /// Build the otpauth URI and QR code for a secret. Deterministic
    /// given the same inputs.
    pub fn setup_artifacts(
        &self,
        account_label: &str,
        secret: &str,
    ) -> Result<SetupArtifacts, AuthError> {
        let totp = self.build(secret, account_label)?;
        let otpauth_uri = totp.get_url();
        let qr_png_base64 = totp
            .get_qr_base64()
            .map_err(|e| AuthError::Crypto(format!("QR render: {e}")))?;

        Ok(SetupArtifacts {
            otpauth_uri,
            qr_png_base64,
        })
    }

    /// Validate a code against a secret at the current time, accepting
    /// the adjacent time step on either side for clock drift.
    ///
    /// Total over its inputs: a malformed code or secret yields `false`,
    /// never an error.
    pub fn verify_code(&self, secret: &str, code: &str) -> bool {
        if !self.code_is_well_formed(code) {
            return false;
        }
        let Ok(totp) = self.build(secret, "account") else {
            return false;
        };
        totp.check_current(code).unwrap_or(false)
    }

    /// Clock-injected variant of [`verify_code`] for deterministic
    /// verification against a known Unix timestamp.
    ///
    /// [`verify_code`]: Self::verify_code
    pub fn verify_code_at(&self, secret: &str, code: &str, timestamp: u64) -> bool {
        if !self.code_is_well_formed(code) {
            return false;
        }
        let Ok(totp) = self.build(secret, "account") else {
            return false;
        };
        totp.check(code, timestamp)
    }

    fn code_is_well_formed(&self, code: &str) -> bool {
        code.len() == self.digits && code.chars().all(|c| c.is_ascii_digit())
    }

    /// Construct the underlying generator for a base32 secret.
    ///
    /// Uses the unchecked constructor: secrets we generate ourselves meet
    /// RFC 6238's size floor, but validation must also accept shorter
    /// externally provisioned secrets rather than erroring on them.
    fn build(&self, secret: &str, account_label: &str) -> Result<TOTP, AuthError> {
        let bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| AuthError::Crypto(format!("secret is not valid base32: {e:?}")))?;

        Ok(TOTP::new_unchecked(
            Algorithm::SHA1,
            self.digits,
            self.skew,
            self.step_secs,
            bytes,
            Some(self.issuer.clone()),
            account_label.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> TotpProvider {
        TotpProvider::new(&AuthConfig {
            totp_issuer: "Schola-Test".into(),
            ..AuthConfig::default()
        })
    }

    #[test]
    fn generated_secret_is_32_base32_chars() {
        let p = provider();
        let secret = p.generate_secret();
        assert_eq!(secret.len(), 32);
        assert!(Secret::Encoded(secret).to_bytes().is_ok());
    }

    #[test]
    fn secret_length_is_configurable() {
        let p = TotpProvider::new(&AuthConfig {
            totp_secret_bytes: 32,
            ..AuthConfig::default()
        });
        // 32 bytes → 52 base32 chars (no padding).
        assert_eq!(p.generate_secret().len(), 52);
    }

    #[test]
    fn setup_artifacts_encode_issuer_and_secret() {
        let p = provider();
        let secret = p.generate_secret();
        let artifacts = p.setup_artifacts("ada@example.edu", &secret).unwrap();

        assert!(artifacts.otpauth_uri.starts_with("otpauth://totp/"));
        assert!(artifacts.otpauth_uri.contains("Schola-Test"));
        assert!(artifacts.otpauth_uri.contains("ada%40example.edu"));
        assert!(artifacts.otpauth_uri.contains(&secret));
        assert!(!artifacts.qr_png_base64.is_empty());
    }

    #[test]
    fn current_code_roundtrip() {
        let p = provider();
        let secret = p.generate_secret();
        let code = p
            .build(&secret, "account")
            .unwrap()
            .generate_current()
            .unwrap();
        assert!(p.verify_code(&secret, &code));
    }

    #[test]
    fn known_secret_validates_its_own_code_only() {
        let p = provider();
        let secret = "JBSWY3DPEHPK3PXP";
        let code = p
            .build(secret, "account")
            .unwrap()
            .generate_current()
            .unwrap();

        assert!(p.verify_code(secret, &code));
        assert!(!p.verify_code(secret, "000000") || code == "000000");

        // A code computed from a different secret does not validate.
        let other = p.generate_secret();
        let other_code = p
            .build(&other, "account")
            .unwrap()
            .generate_current()
            .unwrap();
        assert!(p.verify_code(&other, &other_code));
        assert!(!p.verify_code(secret, &other_code) || other_code == code);
    }

    #[test]
    fn drift_window_accepts_adjacent_step_but_not_beyond() {
        let p = provider();
        let secret = "JBSWY3DPEHPK3PXP";
        let t0: u64 = 1_700_000_010;
        let code = p.build(secret, "account").unwrap().generate(t0);

        // Same step and ±1 step validate.
        assert!(p.verify_code_at(secret, &code, t0));
        assert!(p.verify_code_at(secret, &code, t0 - 30));
        assert!(p.verify_code_at(secret, &code, t0 + 30));

        // ±2 steps are outside the window.
        assert!(!p.verify_code_at(secret, &code, t0 - 60));
        assert!(!p.verify_code_at(secret, &code, t0 + 60));
    }

    #[test]
    fn malformed_inputs_return_false_not_error() {
        let p = provider();
        let secret = p.generate_secret();

        // Bad codes.
        assert!(!p.verify_code(&secret, ""));
        assert!(!p.verify_code(&secret, "12345"));
        assert!(!p.verify_code(&secret, "1234567"));
        assert!(!p.verify_code(&secret, "12a456"));

        // Bad secret (not base32).
        assert!(!p.verify_code("not!base32@@", "123456"));
    }
}
