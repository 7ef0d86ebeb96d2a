use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub use crate::auth::password::PasswordEncoder;
pub use crate::policy::authorization::Decision;
pub use crate::policy::headers::{FrameOptions, HeaderMode, HstsConfig, StandardHeaders, XssProtection};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, Default)]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    #[validate(nested)]
    pub auth: AuthConfig,
    #[serde(default)]
    #[validate(nested)]
    pub password: PasswordConfig,
    #[serde(default)]
    pub users: Vec<UserConfig>,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Evaluated top to bottom, first match wins, no match denies
    #[serde(default)]
    pub authorization: Vec<AuthorizationRuleConfig>,
    #[serde(default)]
    pub headers: HeadersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(rename = "type", alias = "verifier")]
    pub verifier: VerifierType,
    /// For static verification
    pub token: Option<String>,
    pub jwt_secret: Option<String>,
    pub issuer: Option<String>,
    pub introspection_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Verification slower than this is treated as unavailable
    #[validate(range(min = 1))]
    pub verifier_timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            verifier: VerifierType::None,
            token: None,
            jwt_secret: None,
            issuer: None,
            introspection_url: None,
            client_id: None,
            client_secret: None,
            verifier_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerifierType {
    #[default]
    None,
    Static,
    Jwt,
    Introspection,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(default)]
pub struct PasswordConfig {
    pub encoder: PasswordEncoder,
    #[validate(range(min = 4, max = 31))]
    pub bcrypt_cost: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            encoder: PasswordEncoder::Bcrypt,
            bcrypt_cost: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserConfig {
    pub username: String,
    /// Digest in the configured encoder's format
    pub password: String,
    #[serde(default)]
    pub authorities: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Stateless and bounded sessions are mutually exclusive
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SessionConfig {
    #[default]
    Stateless,
    Bounded(BoundedSessionConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct BoundedSessionConfig {
    pub max_sessions: usize,
    /// Reject new logins at the limit instead of evicting the oldest session
    pub prevent_new_login_when_full: bool,
    pub idle_timeout_secs: u64,
    /// Where expired, evicted or rejected sessions are redirected
    pub expired_url: String,
    pub cookie_name: String,
}

impl Default for BoundedSessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1,
            prevent_new_login_when_full: true,
            idle_timeout_secs: 1800,
            expired_url: "/login/expired".to_string(),
            cookie_name: "SESSION".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    /// Paths the policy is registered for
    pub path: String,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/**".to_string(),
            allowed_origins: vec!["http://localhost:3300".to_string()],
            allowed_methods: vec!["*".to_string()],
            allowed_headers: vec!["*".to_string()],
            exposed_headers: vec!["Authorization".to_string()],
            allow_credentials: true,
            max_age_secs: Some(3600),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AuthorizationRuleConfig {
    pub paths: Vec<String>,
    /// Empty or `*` means any method
    #[serde(default)]
    pub methods: Vec<String>,
    pub decision: Decision,
}

impl AuthorizationRuleConfig {
    pub fn new(path: &str, decision: Decision) -> Self {
        Self {
            paths: vec![path.to_string()],
            methods: Vec::new(),
            decision,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct HeaderRuleConfig {
    /// Empty means every path
    #[serde(default)]
    pub paths: Vec<String>,
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub mode: HeaderMode,
}

impl HeaderRuleConfig {
    pub fn global(name: &str, value: &str) -> Self {
        Self {
            paths: Vec::new(),
            name: name.to_string(),
            value: value.to_string(),
            mode: HeaderMode::Set,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HeadersConfig {
    /// Built-in writers, applied before `rules`
    pub standard: StandardHeaders,
    pub rules: Vec<HeaderRuleConfig>,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            standard: StandardHeaders::default(),
            rules: vec![
                HeaderRuleConfig::global("X-Content-Security-Policy", "default-src 'self'"),
                HeaderRuleConfig::global("X-WebKit-CSP", "default-src 'self'"),
                HeaderRuleConfig::global("X-Frame-Options", "SAMEORIGIN"),
                HeaderRuleConfig {
                    paths: vec!["/login".to_string()],
                    ..HeaderRuleConfig::global("X-Frame-Options", "DENY")
                },
            ],
        }
    }
}
