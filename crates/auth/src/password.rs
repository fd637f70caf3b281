//! Salted, adaptive secret hashing (argon2id, PHC string format).

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("invalid hashing parameters: {0}")]
    Params(String),

    #[error("salt generation failed: {0}")]
    Salt(String),

    #[error("hashing failed: {0}")]
    Hash(String),
}

/// Hashes and verifies login secrets.
///
/// Verification reads the cost parameters from the stored PHC string, so
/// hashes produced with different parameters stay verifiable.
#[derive(Debug, Clone)]
pub struct SecretHasher {
    params: Params,
}

impl Default for SecretHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl SecretHasher {
    /// `memory_kib`, `iterations` and `parallelism` map to argon2's m/t/p costs.
    pub fn with_cost(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| PasswordError::Params(e.to_string()))?;
        Ok(Self { params })
    }

    /// Minimal-cost parameters for tests and local fixtures.
    pub fn low_cost() -> Self {
        Self::with_cost(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST)
            .unwrap_or_default()
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| PasswordError::Salt(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError::Salt(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let phc = argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?
            .to_string();
        Ok(phc)
    }

    /// Constant-time comparison of `plaintext` against a stored PHC hash.
    ///
    /// An unparsable hash never verifies.
    pub fn verify(&self, phc: &str, plaintext: &str) -> bool {
        match PasswordHash::new(phc) {
            Ok(parsed) => Argon2::default()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = SecretHasher::low_cost();
        let phc = hasher.hash("password123").unwrap();
        assert!(phc.starts_with("$argon2id$"));
        assert!(hasher.verify(&phc, "password123"));
        assert!(!hasher.verify(&phc, "password124"));
    }

    #[test]
    fn same_secret_gets_distinct_salts() {
        let hasher = SecretHasher::low_cost();
        assert_ne!(hasher.hash("secret").unwrap(), hasher.hash("secret").unwrap());
    }

    #[test]
    fn garbage_hash_never_verifies() {
        let hasher = SecretHasher::low_cost();
        assert!(!hasher.verify("not-a-phc-string", "secret"));
        assert!(!hasher.verify("", ""));
    }

    #[test]
    fn zero_memory_cost_is_rejected() {
        assert!(matches!(SecretHasher::with_cost(0, 1, 1), Err(PasswordError::Params(_))));
    }
}
