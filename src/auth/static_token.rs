//! Static token verifier
use crate::auth::provider::{Identity, IdentityVerifier};
use crate::utils::errors::{GateError, GateResult};
use async_trait::async_trait;

/// Static token verification (for development/simple deployments)
pub struct StaticTokenVerifier {
    token: String,
    subject: String,
    authorities: Vec<String>,
}

impl StaticTokenVerifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            subject: "admin".to_string(),
            authorities: vec!["*".to_string()], // Full access
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_authorities(mut self, authorities: Vec<String>) -> Self {
        self.authorities = authorities;
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, credential: &str) -> GateResult<Identity> {
        if !self.token.is_empty() && credential == self.token {
            Ok(Identity::new(self.subject.clone(), self.authorities.clone()))
        } else {
            Err(GateError::Unauthorized("Invalid token".to_string()))
        }
    }

    fn name(&self) -> &'static str {
        "static"
    }

    fn is_configured(&self) -> bool {
        !self.token.is_empty()
    }
}
