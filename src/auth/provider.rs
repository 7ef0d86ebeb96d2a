//! Identity verifier trait
use crate::utils::errors::GateResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Authenticated subject attached to an admitted request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    pub authorities: Vec<String>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Identity {
    pub fn new(subject: impl Into<String>, authorities: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            authorities,
            expires_at: None,
        }
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == "*" || a == authority)
    }
}

/// Verifies a self-contained credential (bearer token) and returns its identity.
///
/// Implementations return `GateError::Unauthorized` for a credential that is
/// invalid and `GateError::VerifierUnavailable` when the check itself could
/// not be performed. Callers deny in both cases.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> GateResult<Identity>;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Check if the verifier is properly configured
    fn is_configured(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_authority() {
        let admin = Identity::new("admin", vec!["*".to_string()]);
        assert!(admin.has_authority("write"));

        let reader = Identity::new("reader", vec!["read".to_string()]);
        assert!(reader.has_authority("read"));
        assert!(!reader.has_authority("write"));
    }
}
