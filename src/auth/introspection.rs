//! Remote token introspection verifier (RFC 7662)
//!
//! Transport failures and server errors are reported as
//! `VerifierUnavailable`; an inactive token is `Unauthorized`.

use crate::auth::provider::{Identity, IdentityVerifier};
use crate::utils::errors::{GateError, GateResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Token introspection response
#[derive(Debug, Deserialize)]
struct TokenIntrospectionResponse {
    active: bool,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    authorities: Option<Vec<String>>,
    #[serde(default)]
    exp: Option<i64>,
}

pub struct IntrospectionVerifier {
    client: reqwest::Client,
    introspection_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl IntrospectionVerifier {
    pub fn new(introspection_url: impl Into<String>, timeout: Duration) -> GateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            introspection_url: introspection_url.into(),
            client_id: None,
            client_secret: None,
        })
    }

    pub fn with_client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    async fn introspect(&self, token: &str) -> GateResult<TokenIntrospectionResponse> {
        let params = [("token", token), ("token_type_hint", "access_token")];

        let mut request = self.client.post(&self.introspection_url).form(&params);
        if let Some(client_id) = &self.client_id {
            request = request.basic_auth(client_id, self.client_secret.as_ref());
        }

        let response = request.send().await.map_err(|e| {
            GateError::VerifierUnavailable(format!("Introspection request failed: {}", e))
        })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(GateError::VerifierUnavailable(format!(
                "Introspection returned error: {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(GateError::Unauthorized(format!(
                "Introspection rejected token: {}",
                status
            )));
        }

        response.json().await.map_err(|e| {
            GateError::VerifierUnavailable(format!("Failed to parse introspection response: {}", e))
        })
    }
}

#[async_trait]
impl IdentityVerifier for IntrospectionVerifier {
    async fn verify(&self, credential: &str) -> GateResult<Identity> {
        let introspection = self.introspect(credential).await?;
        if !introspection.active {
            debug!("introspection reported inactive token");
            return Err(GateError::Unauthorized("Token is not active".to_string()));
        }

        let subject = introspection
            .sub
            .or(introspection.username)
            .ok_or_else(|| GateError::Unauthorized("Token has no subject".to_string()))?;

        let authorities = introspection.authorities.unwrap_or_else(|| {
            introspection
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default()
        });

        Ok(Identity {
            subject,
            authorities,
            expires_at: introspection
                .exp
                .and_then(|exp| chrono::DateTime::from_timestamp(exp, 0)),
        })
    }

    fn name(&self) -> &'static str {
        "introspection"
    }

    fn is_configured(&self) -> bool {
        !self.introspection_url.is_empty()
    }
}
