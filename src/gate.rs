//! The request gate
//!
//! Composes the authorization table, identity resolution, session policy,
//! header policy and CORS policy into one admission decision per request.
//! Stages run in a fixed order: authorization decision, identity resolution
//! (bearer credential first, then session cookie), admission, authorities
//! logging. Response shaping is separate and applies to every response,
//! rejections included.
//!
//! Anything that cannot be evaluated denies. A verifier that errors or
//! exceeds its timeout never yields an admission.

use axum::http::{header, HeaderMap, Method};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::{
    build_hasher, BcryptHasher, Identity, IdentityVerifier, InMemoryUserStore, IntrospectionVerifier,
    JwtVerifier, PasswordHasher, StaticTokenVerifier, UserStore,
};
use crate::config::{AuthConfig, Config, VerifierType};
use crate::policy::{
    AuthorizationPolicy, CorsPolicy, Decision, HeaderPolicy, SessionPolicy, SessionTicket,
};
use crate::utils::errors::{GateError, GateResult};

/// The parts of an inbound request the gate looks at
#[derive(Debug, Clone, Copy)]
pub struct RequestDescriptor<'a> {
    pub path: &'a str,
    pub method: &'a Method,
    pub headers: &'a HeaderMap,
}

impl<'a> RequestDescriptor<'a> {
    pub fn new(path: &'a str, method: &'a Method, headers: &'a HeaderMap) -> Self {
        Self {
            path,
            method,
            headers,
        }
    }

    /// Bearer credential from the `Authorization` header
    pub fn bearer(&self) -> Option<&'a str> {
        self.headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Value of the named cookie, searching every `Cookie` header
    pub fn cookie(&self, name: &str) -> Option<&'a str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn origin(&self) -> Option<&'a str> {
        self.headers
            .get(header::ORIGIN)
            .and_then(|value| value.to_str().ok())
    }
}

/// A request the gate let through
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub decision: Decision,
    /// `None` for anonymous access to a permitted route
    pub identity: Option<Identity>,
    /// Session token the identity was resolved from, bounded mode only
    pub session: Option<String>,
}

/// Result of a successful login
#[derive(Debug, Clone, PartialEq)]
pub struct Login {
    pub identity: Identity,
    /// `None` under the stateless session policy
    pub session: Option<SessionTicket>,
}

struct ResolvedIdentity {
    identity: Option<Identity>,
    session: Option<String>,
}

pub struct Gate {
    authorization: AuthorizationPolicy,
    session: SessionPolicy,
    headers: HeaderPolicy,
    cors: Option<CorsPolicy>,
    verifier: Option<Arc<dyn IdentityVerifier>>,
    verifier_timeout: Duration,
    hasher: Arc<dyn PasswordHasher>,
    users: Arc<dyn UserStore>,
}

impl Gate {
    /// Stateless gate with no verifier, no CORS and no users
    pub fn new(authorization: AuthorizationPolicy, headers: HeaderPolicy) -> Self {
        Self {
            authorization,
            session: SessionPolicy::Stateless,
            headers,
            cors: None,
            verifier: None,
            verifier_timeout: Duration::from_secs(2),
            hasher: Arc::new(BcryptHasher::default()),
            users: Arc::new(InMemoryUserStore::new()),
        }
    }

    pub fn from_config(config: &Config) -> GateResult<Self> {
        let authorization = AuthorizationPolicy::from_config(&config.authorization)?;
        let headers = HeaderPolicy::from_config(&config.headers)?;
        let cors = if config.cors.enabled {
            Some(CorsPolicy::from_config(&config.cors)?)
        } else {
            None
        };

        let mut gate = Self::new(authorization, headers)
            .with_session(SessionPolicy::from_config(&config.session))
            .with_verifier_timeout(Duration::from_millis(config.auth.verifier_timeout_ms))
            .with_hasher(build_hasher(
                config.password.encoder,
                config.password.bcrypt_cost,
            ))
            .with_users(Arc::new(InMemoryUserStore::from_config(&config.users)));
        gate.cors = cors;
        gate.verifier = build_verifier(&config.auth)?;

        if let Some(verifier) = &gate.verifier {
            info!(verifier = verifier.name(), "identity verifier configured");
        }
        Ok(gate)
    }

    pub fn with_session(mut self, session: SessionPolicy) -> Self {
        self.session = session;
        self
    }

    pub fn with_cors(mut self, cors: CorsPolicy) -> Self {
        self.cors = Some(cors);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn IdentityVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_verifier_timeout(mut self, timeout: Duration) -> Self {
        self.verifier_timeout = timeout;
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_users(mut self, users: Arc<dyn UserStore>) -> Self {
        self.users = users;
        self
    }

    pub fn authorization(&self) -> &AuthorizationPolicy {
        &self.authorization
    }

    pub fn session(&self) -> &SessionPolicy {
        &self.session
    }

    /// Decide whether the request may proceed and with which identity
    pub async fn admit(&self, request: &RequestDescriptor<'_>) -> GateResult<Admission> {
        let decision = self.authorization.decide(request.path, request.method);
        debug!(path = request.path, method = %request.method, ?decision, "authorization decision");

        let resolved = self.resolve_identity(request).await?;

        match (decision, &resolved.identity) {
            (Decision::Permit, _) | (Decision::RequireAuth, Some(_)) => {}
            (Decision::RequireAuth, None) => {
                return Err(GateError::Unauthorized(
                    "Full authentication is required".to_string(),
                ));
            }
            (Decision::Deny, Some(identity)) => {
                info!(subject = %identity.subject, path = request.path, "access denied");
                return Err(GateError::Forbidden(format!(
                    "Access to {} is denied",
                    request.path
                )));
            }
            (Decision::Deny, None) => {
                return Err(GateError::Unauthorized(format!(
                    "Access to {} is denied",
                    request.path
                )));
            }
        }

        match &resolved.identity {
            Some(identity) => info!(
                subject = %identity.subject,
                authorities = ?identity.authorities,
                path = request.path,
                "request admitted"
            ),
            None => debug!(path = request.path, "anonymous request admitted"),
        }

        Ok(Admission {
            decision,
            identity: resolved.identity,
            session: resolved.session,
        })
    }

    async fn resolve_identity(&self, request: &RequestDescriptor<'_>) -> GateResult<ResolvedIdentity> {
        if let Some(credential) = request.bearer() {
            let identity = self.verify_credential(credential).await?;
            return Ok(ResolvedIdentity {
                identity: Some(identity),
                session: None,
            });
        }

        let token = self
            .session
            .cookie_name()
            .and_then(|name| request.cookie(name));
        let identity = self.session.resolve(token)?;
        Ok(ResolvedIdentity {
            session: identity.as_ref().and(token).map(str::to_string),
            identity,
        })
    }

    async fn verify_credential(&self, credential: &str) -> GateResult<Identity> {
        let Some(verifier) = &self.verifier else {
            return Err(GateError::Unauthorized(
                "Bearer credentials are not accepted".to_string(),
            ));
        };

        match tokio::time::timeout(self.verifier_timeout, verifier.verify(credential)).await {
            Ok(Ok(identity)) => Ok(identity),
            Ok(Err(e @ GateError::Unauthorized(_))) => {
                debug!(verifier = verifier.name(), error = %e, "credential rejected");
                Err(e)
            }
            Ok(Err(e)) => {
                warn!(verifier = verifier.name(), error = %e, "identity verifier failed");
                Err(GateError::VerifierUnavailable(e.to_string()))
            }
            Err(_) => {
                warn!(
                    verifier = verifier.name(),
                    timeout_ms = self.verifier_timeout.as_millis() as u64,
                    "identity verifier timed out"
                );
                Err(GateError::VerifierUnavailable(format!(
                    "{} verifier did not answer within {:?}",
                    verifier.name(),
                    self.verifier_timeout
                )))
            }
        }
    }

    /// Check a username and password, then apply the session policy
    pub async fn login(&self, username: &str, password: &str) -> GateResult<Login> {
        let bad_credentials = || GateError::Unauthorized("Bad credentials".to_string());

        let user = self.users.find(username).await.ok_or_else(bad_credentials)?;
        if !user.enabled {
            return Err(GateError::Unauthorized("User is disabled".to_string()));
        }

        let hasher = self.hasher.clone();
        let plain = password.to_string();
        let digest = user.password_digest.clone();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&plain, &digest))
            .await
            .map_err(|e| GateError::InternalError(format!("password check failed: {}", e)))?;
        if !matches {
            debug!(username, "password mismatch");
            return Err(bad_credentials());
        }

        let identity = user.identity();
        let session = self.session.login(&identity)?;
        info!(
            subject = %identity.subject,
            authorities = ?identity.authorities,
            session = session.is_some(),
            "login succeeded"
        );
        Ok(Login { identity, session })
    }

    pub fn logout(&self, token: &str) -> bool {
        self.session.logout(token)
    }

    /// Name of the session cookie, bounded mode only
    pub fn session_cookie(&self) -> Option<&str> {
        self.session.cookie_name()
    }

    pub fn hash_password(&self, plain: &str) -> GateResult<String> {
        self.hasher.hash(plain)
    }

    pub fn cors(&self) -> Option<&CorsPolicy> {
        self.cors.as_ref()
    }

    /// Write the header policy for `path` into a response's headers
    pub fn apply_headers(&self, path: &str, headers: &mut HeaderMap) {
        self.headers.apply(path, headers);
    }
}

fn build_verifier(auth: &AuthConfig) -> GateResult<Option<Arc<dyn IdentityVerifier>>> {
    let missing = |field: &str| GateError::ConfigError(format!("auth.{} is required", field));

    let verifier: Arc<dyn IdentityVerifier> = match auth.verifier {
        VerifierType::None => return Ok(None),
        VerifierType::Static => {
            let token = auth.token.clone().ok_or_else(|| missing("token"))?;
            Arc::new(StaticTokenVerifier::new(token))
        }
        VerifierType::Jwt => {
            let secret = auth.jwt_secret.clone().ok_or_else(|| missing("jwt_secret"))?;
            let mut jwt = JwtVerifier::new(secret);
            if let Some(issuer) = &auth.issuer {
                jwt = jwt.with_issuer(issuer.clone());
            }
            Arc::new(jwt)
        }
        VerifierType::Introspection => {
            let url = auth
                .introspection_url
                .clone()
                .ok_or_else(|| missing("introspection_url"))?;
            let mut introspection =
                IntrospectionVerifier::new(url, Duration::from_millis(auth.verifier_timeout_ms))?;
            if let (Some(id), Some(secret)) = (&auth.client_id, &auth.client_secret) {
                introspection = introspection.with_client_credentials(id.clone(), secret.clone());
            }
            Arc::new(introspection)
        }
    };

    if !verifier.is_configured() {
        return Err(GateError::ConfigError(format!(
            "{} verifier is not fully configured",
            verifier.name()
        )));
    }
    Ok(Some(verifier))
}
