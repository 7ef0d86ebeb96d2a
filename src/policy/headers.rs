//! Response header policy
//!
//! Every rule whose pattern matches the request path is applied, in
//! declaration order. `Set` overwrites earlier values for the same name so
//! the last writer wins; `Append` only adds a value that is not already
//! present, which keeps `apply` idempotent.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::{HeaderRuleConfig, HeadersConfig};
use crate::policy::pattern::{RouteMatcher, RoutePattern};
use crate::utils::errors::{GateError, GateResult};

/// X-Frame-Options header values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum FrameOptions {
    #[default]
    Deny,
    SameOrigin,
}

impl FrameOptions {
    pub fn to_header_value(&self) -> HeaderValue {
        match self {
            FrameOptions::Deny => HeaderValue::from_static("DENY"),
            FrameOptions::SameOrigin => HeaderValue::from_static("SAMEORIGIN"),
        }
    }
}

/// HSTS configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HstsConfig {
    /// Max age in seconds
    pub max_age: u64,
    pub include_subdomains: bool,
    pub preload: bool,
}

impl Default for HstsConfig {
    fn default() -> Self {
        Self {
            max_age: 31536000, // 1 year
            include_subdomains: true,
            preload: false,
        }
    }
}

impl HstsConfig {
    pub fn to_header_value(&self) -> HeaderValue {
        let mut value = format!("max-age={}", self.max_age);
        if self.include_subdomains {
            value.push_str(" ; includeSubDomains");
        }
        if self.preload {
            value.push_str(" ; preload");
        }
        HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("max-age=31536000"))
    }
}

/// X-XSS-Protection header values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum XssProtection {
    Disable,
    Enable,
    #[default]
    Block,
}

impl XssProtection {
    pub fn to_header_value(&self) -> HeaderValue {
        match self {
            XssProtection::Disable => HeaderValue::from_static("0"),
            XssProtection::Enable => HeaderValue::from_static("1"),
            XssProtection::Block => HeaderValue::from_static("1; mode=block"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeaderMode {
    #[default]
    Set,
    Append,
}

type ValueFn = dyn Fn(&str) -> Option<HeaderValue> + Send + Sync;

/// Where a rule's value comes from
#[derive(Clone)]
pub enum HeaderValueSource {
    Static(HeaderValue),
    /// Computed from the request path; `None` skips the header
    Computed(Arc<ValueFn>),
}

impl HeaderValueSource {
    fn resolve(&self, path: &str) -> Option<HeaderValue> {
        match self {
            HeaderValueSource::Static(value) => Some(value.clone()),
            HeaderValueSource::Computed(f) => f(path),
        }
    }
}

impl fmt::Debug for HeaderValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValueSource::Static(value) => f.debug_tuple("Static").field(value).finish(),
            HeaderValueSource::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeaderRule {
    /// `None` applies to all routes
    pub pattern: Option<RoutePattern>,
    pub name: HeaderName,
    pub value: HeaderValueSource,
    pub mode: HeaderMode,
}

impl HeaderRule {
    pub fn set(name: HeaderName, value: HeaderValue) -> Self {
        Self {
            pattern: None,
            name,
            value: HeaderValueSource::Static(value),
            mode: HeaderMode::Set,
        }
    }

    pub fn computed<F>(name: HeaderName, f: F) -> Self
    where
        F: Fn(&str) -> Option<HeaderValue> + Send + Sync + 'static,
    {
        Self {
            pattern: None,
            name,
            value: HeaderValueSource::Computed(Arc::new(f)),
            mode: HeaderMode::Set,
        }
    }

    pub fn with_mode(mut self, mode: HeaderMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn for_paths(mut self, pattern: RoutePattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn from_config(config: &HeaderRuleConfig) -> GateResult<Self> {
        let name = HeaderName::from_bytes(config.name.as_bytes()).map_err(|_| {
            GateError::ConfigError(format!("invalid header name: {}", config.name))
        })?;
        let value = HeaderValue::from_str(&config.value).map_err(|_| {
            GateError::ConfigError(format!("invalid value for header {}", config.name))
        })?;

        let mut rule = Self::set(name, value).with_mode(config.mode);
        if !config.paths.is_empty() {
            let matchers = config
                .paths
                .iter()
                .map(|p| RouteMatcher::parse(p))
                .collect::<GateResult<Vec<_>>>()?;
            rule = rule.for_paths(RoutePattern::new(matchers));
        }
        Ok(rule)
    }

    fn applies_to(&self, path: &str) -> bool {
        self.pattern
            .as_ref()
            .map(|p| p.matches_path(path))
            .unwrap_or(true)
    }
}

/// Built-in writers that can be switched on individually
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StandardHeaders {
    pub cache_control: bool,
    pub content_type_options: bool,
    pub hsts: Option<HstsConfig>,
    pub frame_options: Option<FrameOptions>,
    pub xss_protection: Option<XssProtection>,
}

impl Default for StandardHeaders {
    fn default() -> Self {
        Self {
            cache_control: true,
            content_type_options: true,
            hsts: Some(HstsConfig::default()),
            frame_options: Some(FrameOptions::Deny),
            xss_protection: Some(XssProtection::Block),
        }
    }
}

impl StandardHeaders {
    /// Expand into global header rules, in a fixed order
    pub fn rules(&self) -> Vec<HeaderRule> {
        let mut rules = Vec::new();

        if self.cache_control {
            rules.push(HeaderRule::set(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-store, max-age=0, must-revalidate"),
            ));
            rules.push(HeaderRule::set(header::PRAGMA, HeaderValue::from_static("no-cache")));
            rules.push(HeaderRule::set(header::EXPIRES, HeaderValue::from_static("0")));
        }

        if self.content_type_options {
            rules.push(HeaderRule::set(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ));
        }

        if let Some(hsts) = &self.hsts {
            rules.push(HeaderRule::set(
                header::STRICT_TRANSPORT_SECURITY,
                hsts.to_header_value(),
            ));
        }

        if let Some(frame) = &self.frame_options {
            rules.push(HeaderRule::set(header::X_FRAME_OPTIONS, frame.to_header_value()));
        }

        if let Some(xss) = &self.xss_protection {
            rules.push(HeaderRule::set(header::X_XSS_PROTECTION, xss.to_header_value()));
        }

        rules
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeaderPolicy {
    rules: Vec<HeaderRule>,
}

impl HeaderPolicy {
    pub fn new(rules: Vec<HeaderRule>) -> Self {
        Self { rules }
    }

    /// Standard writers first, then configured rules in declaration order
    pub fn from_config(config: &HeadersConfig) -> GateResult<Self> {
        let mut rules = config.standard.rules();
        for rule in &config.rules {
            rules.push(HeaderRule::from_config(rule)?);
        }
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[HeaderRule] {
        &self.rules
    }

    /// Write every matching rule into `headers`
    pub fn apply(&self, path: &str, headers: &mut HeaderMap) {
        for rule in self.rules.iter().filter(|r| r.applies_to(path)) {
            let Some(value) = rule.value.resolve(path) else {
                continue;
            };
            match rule.mode {
                HeaderMode::Set => {
                    headers.insert(rule.name.clone(), value);
                }
                HeaderMode::Append => {
                    if !headers.get_all(&rule.name).iter().any(|v| *v == value) {
                        headers.append(rule.name.clone(), value);
                    }
                }
            }
        }
    }

    /// Owned variant of [`HeaderPolicy::apply`]
    pub fn applied(&self, path: &str, mut headers: HeaderMap) -> HeaderMap {
        self.apply(path, &mut headers);
        headers
    }
}
