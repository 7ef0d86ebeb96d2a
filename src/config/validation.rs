//! Configuration validation
//!
//! Errors make a configuration unusable. Warnings flag configurations that
//! load but probably do not do what the author meant, such as authorization
//! rules that can never fire.

use crate::auth::PasswordEncoder;
use crate::config::manager::{ConfigFormat, ConfigManager};
use crate::config::{Config, SessionConfig, VerifierType};
use crate::policy::{AuthorizationPolicy, CorsPolicy, HeaderRule};
use schemars::schema_for;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use validator::Validate;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Configuration validator
pub struct ConfigValidator {
    schema: Value,
}

impl ConfigValidator {
    /// Create a new validator with the generated schema
    pub fn new() -> Self {
        let schema = schema_for!(Config);
        Self {
            schema: serde_json::to_value(&schema).unwrap_or_default(),
        }
    }

    /// Get the JSON Schema for the configuration
    pub fn get_schema(&self) -> &Value {
        &self.schema
    }

    /// Export the schema to a JSON string
    pub fn export_schema(&self) -> String {
        serde_json::to_string_pretty(&self.schema).unwrap_or_default()
    }

    /// Validate a configuration file; `Ok` carries warnings
    pub async fn validate_file(
        &self,
        path: &str,
    ) -> Result<Vec<ValidationError>, Vec<ValidationError>> {
        let expanded = shellexpand::tilde(path).to_string();
        let path = Path::new(&expanded);

        if !path.exists() {
            return Err(vec![ValidationError::new(
                path.to_string_lossy(),
                "Configuration file does not exist",
            )]);
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            vec![ValidationError::new(
                path.to_string_lossy(),
                format!("Failed to read file: {}", e),
            )]
        })?;

        self.validate_str(&content, ConfigFormat::detect(path, &content))
    }

    /// Validate TOML content
    pub fn validate_toml(&self, content: &str) -> Result<Vec<ValidationError>, Vec<ValidationError>> {
        self.validate_str(content, ConfigFormat::Toml)
    }

    pub fn validate_str(
        &self,
        content: &str,
        format: ConfigFormat,
    ) -> Result<Vec<ValidationError>, Vec<ValidationError>> {
        let config = ConfigManager::parse_content(content, format)
            .map_err(|e| vec![ValidationError::new("root", e.to_string())])?;
        self.validate(&config)
    }

    /// Validate a parsed configuration; `Ok` carries warnings
    pub fn validate(&self, config: &Config) -> Result<Vec<ValidationError>, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // Nested struct errors only show up in the Display output
        if let Err(validation_errors) = config.validate() {
            errors.push(ValidationError::new("root", validation_errors.to_string()));
        }

        self.validate_auth_config(config, &mut errors);
        self.validate_password_config(config, &mut errors, &mut warnings);
        self.validate_session_config(config, &mut errors);
        self.validate_authorization(config, &mut errors, &mut warnings);
        self.validate_headers(config, &mut errors);
        self.validate_cors(config, &mut errors, &mut warnings);

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(errors)
        }
    }

    fn validate_auth_config(&self, config: &Config, errors: &mut Vec<ValidationError>) {
        let auth = &config.auth;
        match auth.verifier {
            VerifierType::None => {}
            VerifierType::Static => {
                if auth.token.as_deref().map_or(true, str::is_empty) {
                    errors.push(ValidationError::new(
                        "auth.token",
                        "Static verification requires a token",
                    ));
                }
            }
            VerifierType::Jwt => {
                if auth.jwt_secret.as_deref().map_or(true, str::is_empty) {
                    errors.push(ValidationError::new(
                        "auth.jwt_secret",
                        "JWT verification requires a secret",
                    ));
                }
            }
            VerifierType::Introspection => match &auth.introspection_url {
                None => errors.push(ValidationError::new(
                    "auth.introspection_url",
                    "Introspection requires a URL",
                )),
                Some(raw) => {
                    if let Err(e) = url::Url::parse(raw) {
                        errors.push(ValidationError::new(
                            "auth.introspection_url",
                            format!("Invalid URL: {}", e),
                        ));
                    }
                }
            },
        }
    }

    fn validate_password_config(
        &self,
        config: &Config,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<ValidationError>,
    ) {
        if config.password.encoder == PasswordEncoder::Noop {
            warnings.push(ValidationError::new(
                "password.encoder",
                "noop encoder stores and compares plain-text passwords",
            ));
        }

        let mut names = HashSet::new();
        for (idx, user) in config.users.iter().enumerate() {
            if user.username.is_empty() {
                errors.push(ValidationError::new(
                    format!("users[{}].username", idx),
                    "Username cannot be empty",
                ));
            }
            if !names.insert(&user.username) {
                errors.push(ValidationError::new(
                    format!("users[{}].username", idx),
                    format!("Duplicate username: {}", user.username),
                ));
            }
        }
    }

    fn validate_session_config(&self, config: &Config, errors: &mut Vec<ValidationError>) {
        if let SessionConfig::Bounded(bounded) = &config.session {
            if bounded.max_sessions == 0 {
                errors.push(ValidationError::new(
                    "session.max_sessions",
                    "Bounded sessions need max_sessions of at least 1",
                ));
            }
            if bounded.idle_timeout_secs == 0 {
                errors.push(ValidationError::new(
                    "session.idle_timeout_secs",
                    "Idle timeout of 0 expires every session on its next request",
                ));
            }
            if bounded.cookie_name.is_empty() {
                errors.push(ValidationError::new(
                    "session.cookie_name",
                    "Cookie name cannot be empty",
                ));
            }
            if !bounded.expired_url.starts_with('/') {
                errors.push(ValidationError::new(
                    "session.expired_url",
                    "Expired URL must be an absolute path",
                ));
            }
        }
    }

    fn validate_authorization(
        &self,
        config: &Config,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<ValidationError>,
    ) {
        if config.authorization.is_empty() {
            warnings.push(ValidationError::new(
                "authorization",
                "No authorization rules; every request is denied",
            ));
            return;
        }

        match AuthorizationPolicy::from_config(&config.authorization) {
            Ok(policy) => {
                for shadowed in policy.shadowed_rules() {
                    warnings.push(ValidationError::new(
                        format!("authorization[{}]", shadowed.index),
                        format!(
                            "Rule is unreachable; authorization[{}] matches first",
                            shadowed.shadowed_by
                        ),
                    ));
                }
            }
            Err(e) => errors.push(ValidationError::new("authorization", e.to_string())),
        }
    }

    fn validate_headers(&self, config: &Config, errors: &mut Vec<ValidationError>) {
        for (idx, rule) in config.headers.rules.iter().enumerate() {
            if let Err(e) = HeaderRule::from_config(rule) {
                errors.push(ValidationError::new(
                    format!("headers.rules[{}]", idx),
                    e.to_string(),
                ));
            }
        }
    }

    fn validate_cors(
        &self,
        config: &Config,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<ValidationError>,
    ) {
        let cors = &config.cors;
        if !cors.enabled {
            return;
        }
        if let Err(e) = CorsPolicy::from_config(cors) {
            errors.push(ValidationError::new("cors", e.to_string()));
        }
        if cors.allow_credentials && cors.allowed_origins.iter().any(|o| o == "*") {
            warnings.push(ValidationError::new(
                "cors.allowed_origins",
                "Wildcard origin with credentials echoes every origin back",
            ));
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
