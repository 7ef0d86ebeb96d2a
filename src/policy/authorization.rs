//! Path authorization policy
//!
//! Rules are evaluated in declaration order and the first match wins.
//! A later, narrower rule never overrides an earlier broad one, so
//! `[("/**", Permit), ("/admin/**", Deny)]` permits `/admin/x`.

use axum::http::Method;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::AuthorizationRuleConfig;
use crate::policy::pattern::{MethodSet, PathPattern, RouteMatcher, RoutePattern};
use crate::utils::errors::{GateError, GateResult};

/// Outcome of the path authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Permit,
    Deny,
    RequireAuth,
}

#[derive(Debug, Clone)]
pub struct AuthorizationRule {
    pub pattern: RoutePattern,
    pub decision: Decision,
}

impl AuthorizationRule {
    pub fn new(pattern: RoutePattern, decision: Decision) -> Self {
        Self { pattern, decision }
    }

    pub fn from_config(config: &AuthorizationRuleConfig) -> GateResult<Self> {
        if config.paths.is_empty() {
            return Err(GateError::ConfigError(
                "authorization rule must name at least one path".to_string(),
            ));
        }
        let methods = MethodSet::parse(&config.methods)?;
        let matchers = config
            .paths
            .iter()
            .map(|p| -> GateResult<RouteMatcher> {
                Ok(RouteMatcher::new(PathPattern::parse(p)?, methods.clone()))
            })
            .collect::<GateResult<Vec<_>>>()?;
        Ok(Self::new(RoutePattern::new(matchers), config.decision))
    }
}

/// A rule that can never fire because an earlier rule already covers it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowedRule {
    pub index: usize,
    pub shadowed_by: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AuthorizationPolicy {
    rules: Vec<AuthorizationRule>,
}

impl AuthorizationPolicy {
    pub fn new(rules: Vec<AuthorizationRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(rules: &[AuthorizationRuleConfig]) -> GateResult<Self> {
        rules
            .iter()
            .map(AuthorizationRule::from_config)
            .collect::<GateResult<Vec<_>>>()
            .map(Self::new)
    }

    pub fn rules(&self) -> &[AuthorizationRule] {
        &self.rules
    }

    pub fn decide(&self, path: &str, method: &Method) -> Decision {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path, method))
            .map(|rule| rule.decision)
            .unwrap_or(Decision::Deny)
    }

    /// Rules fully covered by an earlier any-method rule.
    ///
    /// Reported, never rewritten: the table is evaluated exactly as declared.
    pub fn shadowed_rules(&self) -> Vec<ShadowedRule> {
        let mut shadowed = Vec::new();
        for (index, rule) in self.rules.iter().enumerate() {
            let earlier = self.rules[..index].iter().position(|prior| {
                rule.pattern.matchers().iter().all(|later| {
                    prior.pattern.matchers().iter().any(|m| {
                        m.methods == MethodSet::Any
                            && m.path.covers(&later.path)
                    })
                })
            });
            if let Some(shadowed_by) = earlier {
                shadowed.push(ShadowedRule { index, shadowed_by });
            }
        }
        shadowed
    }
}
