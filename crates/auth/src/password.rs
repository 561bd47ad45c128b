//! Argon2id password hashing.

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SALT_BYTES: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("invalid password hashing parameters: {0}")]
    InvalidParams(String),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordHashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl PasswordHashCost {
    /// Smallest cost argon2 accepts. Only for tests.
    pub fn minimal() -> Self {
        Self {
            memory_kib: Params::MIN_M_COST,
            iterations: Params::MIN_T_COST,
            parallelism: Params::MIN_P_COST,
        }
    }
}

/// Salted, memory-hard password hashing with constant-time verification.
///
/// Holds a pre-computed hash of a random password so that a login for an
/// unknown user still pays for one verification.
#[derive(Clone)]
pub struct PasswordHasher {
    argon: Argon2<'static>,
    dummy_hash: String,
}

impl core::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

impl PasswordHasher {
    pub fn new(cost: PasswordHashCost) -> Result<Self, PasswordError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut filler = [0u8; 32];
        OsRng.fill_bytes(&mut filler);
        let dummy_hash = hash_with(&argon, &filler)?;

        Ok(Self { argon, dummy_hash })
    }

    /// Hash a password into a PHC string (algorithm, params and salt embedded).
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        hash_with(&self.argon, password.as_bytes())
    }

    /// Verify `password` against `stored`, or against the dummy hash when there
    /// is no stored hash. A malformed stored hash verifies as `false`.
    pub fn verify(&self, password: &str, stored: Option<&str>) -> bool {
        let (hash, real) = match stored {
            Some(hash) => (hash, true),
            None => (self.dummy_hash.as_str(), false),
        };

        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        let matched = self.argon.verify_password(password.as_bytes(), &parsed).is_ok();
        real && matched
    }
}

fn hash_with(argon: &Argon2<'static>, password: &[u8]) -> Result<String, PasswordError> {
    let mut salt_bytes = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError::Hash(e.to_string()))?;

    argon
        .hash_password(password, salt.as_salt())
        .map(|h| h.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(PasswordHashCost::minimal()).unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let hasher = hasher();
        let hash = hasher.hash("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", Some(&hash)));
        assert!(!hasher.verify("wrong horse", Some(&hash)));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let hasher = hasher();
        assert_ne!(hasher.hash("pw123456").unwrap(), hasher.hash("pw123456").unwrap());
    }

    #[test]
    fn missing_or_malformed_hash_never_verifies() {
        let hasher = hasher();
        assert!(!hasher.verify("anything", None));
        assert!(!hasher.verify("anything", Some("plaintext")));
    }

    #[test]
    fn invalid_cost_is_rejected() {
        let cost = PasswordHashCost {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(matches!(
            PasswordHasher::new(cost),
            Err(PasswordError::InvalidParams(_))
        ));
    }
}
