//! Password hashing
//!
//! `BcryptHasher` is the default. `NoOpHasher` stores and compares plain
//! text and exists only for local fixtures; it is unsafe for production
//! and warns when constructed.

use crate::utils::errors::{GateError, GateResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &str) -> GateResult<String>;

    fn verify(&self, plain: &str, digest: &str) -> bool;

    fn name(&self) -> &'static str;
}

pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plain: &str) -> GateResult<String> {
        bcrypt::hash(plain, self.cost)
            .map_err(|e| GateError::InternalError(format!("bcrypt hashing failed: {}", e)))
    }

    fn verify(&self, plain: &str, digest: &str) -> bool {
        bcrypt::verify(plain, digest).unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "bcrypt"
    }
}

/// Plain-text "hasher". Unsafe outside tests and local fixtures.
pub struct NoOpHasher {
    _private: (),
}

impl NoOpHasher {
    pub fn new_insecure() -> Self {
        warn!("NoOpHasher in use: passwords are stored and compared as plain text");
        Self { _private: () }
    }
}

impl PasswordHasher for NoOpHasher {
    fn hash(&self, plain: &str) -> GateResult<String> {
        Ok(plain.to_string())
    }

    fn verify(&self, plain: &str, digest: &str) -> bool {
        plain == digest
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PasswordEncoder {
    #[default]
    Bcrypt,
    /// Plain text; never use in production
    Noop,
}

pub fn build_hasher(encoder: PasswordEncoder, bcrypt_cost: u32) -> Arc<dyn PasswordHasher> {
    match encoder {
        PasswordEncoder::Bcrypt => Arc::new(BcryptHasher::new(bcrypt_cost)),
        PasswordEncoder::Noop => Arc::new(NoOpHasher::new_insecure()),
    }
}
