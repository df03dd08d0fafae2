//! Password hashing collaborator.
//!
//! Hashes are argon2 PHC strings, so the salt and cost parameters travel with
//! the stored hash and older hashes keep verifying if the defaults change.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use tracing::warn;

pub trait Credentials: Send + Sync {
    /// One-way hash of `password`, suitable for storing.
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// Whether `password` matches a hash produced by [`Credentials::hash`].
    fn verify(&self, hash: &str, password: &str) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("invalid argon2 parameters: {0}")]
    Params(String),
}

#[derive(Debug, Clone, Default)]
pub struct Argon2Credentials {
    params: Params,
}

impl Argon2Credentials {
    pub fn new(params: Params) -> Argon2Credentials {
        Argon2Credentials { params }
    }

    /// Builds explicit argon2id parameters: memory in KiB, iterations, lanes.
    pub fn with_cost(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Argon2Credentials, AuthError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|err| AuthError::Params(err.to_string()))?;

        Ok(Argon2Credentials::new(params))
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Credentials for Argon2Credentials {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| AuthError::Hash(err.to_string()))
    }

    fn verify(&self, hash: &str, password: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(%err, "stored password hash is not a valid PHC string");
                return false;
            }
        };

        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}
