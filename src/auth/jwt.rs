//! JWT identity verifier
use crate::auth::provider::{Identity, IdentityVerifier};
use crate::utils::errors::{GateError, GateResult};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    authorities: Vec<String>,
    iss: String,
    exp: i64,
    iat: i64,
    jti: String,
}

/// HS256 signed token verifier
pub struct JwtVerifier {
    secret: String,
    issuer: String,
    default_expiry: Duration,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: "gatekeep".to_string(),
            default_expiry: Duration::hours(24),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_default_expiry(mut self, expiry: Duration) -> Self {
        self.default_expiry = expiry;
        self
    }

    /// Sign a token for local testing; production tokens come from the issuer
    pub fn issue(&self, subject: &str, authorities: Vec<String>) -> GateResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            authorities,
            iss: self.issuer.clone(),
            exp: (now + self.default_expiry).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| GateError::InternalError(format!("Token signing failed: {}", e)))
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, credential: &str) -> GateResult<Identity> {
        let mut validation = Validation::default();
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let token_data = decode::<Claims>(
            credential,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| GateError::Unauthorized(format!("Invalid token: {}", e)))?;

        let claims = token_data.claims;
        Ok(Identity {
            subject: claims.sub,
            authorities: claims.authorities,
            expires_at: chrono::DateTime::from_timestamp(claims.exp, 0),
        })
    }

    fn name(&self) -> &'static str {
        "jwt"
    }

    fn is_configured(&self) -> bool {
        !self.secret.is_empty()
    }
}
