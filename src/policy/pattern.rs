//! Ant-style path patterns and method sets
//!
//! A pattern is split on `/` into segments. `**` consumes any number of
//! segments (including none), `*` matches any run of characters inside one
//! segment and `?` matches exactly one character.

use axum::http::Method;
use std::fmt;

use crate::utils::errors::{GateError, GateResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// `**`
    AnyDepth,
    /// A segment without wildcards
    Literal(String),
    /// A segment containing `*` or `?`
    Wildcard(Vec<char>),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if raw == "**" {
            Segment::AnyDepth
        } else if raw.contains('*') || raw.contains('?') {
            Segment::Wildcard(raw.chars().collect())
        } else {
            Segment::Literal(raw.to_string())
        }
    }

    fn matches(&self, candidate: &str) -> bool {
        match self {
            Segment::AnyDepth => true,
            Segment::Literal(lit) => lit == candidate,
            Segment::Wildcard(pattern) => {
                let candidate: Vec<char> = candidate.chars().collect();
                wildcard_match(pattern, &candidate)
            }
        }
    }
}

/// Glob match of one segment, `*` = any run, `?` = any single char
fn wildcard_match(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut resume = 0usize;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            resume = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            resume += 1;
            t = resume;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Request path segments with any query string or fragment removed
fn split_request_path(path: &str) -> Vec<&str> {
    split_segments(path.split(['?', '#']).next().unwrap_or_default())
}

/// Compiled path glob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> GateResult<Self> {
        if !pattern.starts_with('/') {
            return Err(GateError::ConfigError(format!(
                "path pattern must start with '/': {}",
                pattern
            )));
        }
        if pattern
            .split('/')
            .any(|seg| seg.contains("**") && seg != "**")
        {
            return Err(GateError::ConfigError(format!(
                "'**' must be a whole path segment: {}",
                pattern
            )));
        }

        Ok(Self {
            source: pattern.to_string(),
            segments: split_segments(pattern).into_iter().map(Segment::parse).collect(),
        })
    }

    /// Pattern matching every path
    pub fn any() -> Self {
        Self {
            source: "/**".to_string(),
            segments: vec![Segment::AnyDepth],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> bool {
        let candidate = split_request_path(path);
        match_segments(&self.segments, &candidate)
    }

    /// True when this pattern matches every path the other pattern can match.
    /// Conservative: only recognises prefix-literal patterns ending in `**`.
    pub fn covers(&self, other: &PathPattern) -> bool {
        if self == other {
            return true;
        }
        let Some((last, prefix)) = self.segments.split_last() else {
            return false;
        };
        if *last != Segment::AnyDepth {
            return false;
        }
        if prefix.len() > other.segments.len() {
            return false;
        }
        prefix
            .iter()
            .zip(other.segments.iter())
            .all(|(mine, theirs)| match (mine, theirs) {
                (Segment::Literal(a), Segment::Literal(b)) => a == b,
                (Segment::Wildcard(_), Segment::Literal(b)) => mine.matches(b),
                _ => false,
            })
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((segment, rest)) => match path.split_first() {
            Some((head, tail)) => segment.matches(head) && match_segments(rest, tail),
            None => false,
        },
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Methods a matcher accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSet {
    Any,
    Only(Vec<Method>),
}

impl MethodSet {
    /// Parse method names; an empty list or `*` means any method
    pub fn parse<S: AsRef<str>>(methods: &[S]) -> GateResult<Self> {
        if methods.is_empty() || methods.iter().any(|m| m.as_ref() == "*") {
            return Ok(MethodSet::Any);
        }

        let parsed = methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.as_ref().to_ascii_uppercase().as_bytes())
                    .map_err(|_| GateError::ConfigError(format!("invalid method: {}", m.as_ref())))
            })
            .collect::<GateResult<Vec<_>>>()?;
        Ok(MethodSet::Only(parsed))
    }

    pub fn contains(&self, method: &Method) -> bool {
        match self {
            MethodSet::Any => true,
            MethodSet::Only(methods) => methods.contains(method),
        }
    }
}

/// Path glob plus the methods it applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatcher {
    pub path: PathPattern,
    pub methods: MethodSet,
}

impl RouteMatcher {
    pub fn new(path: PathPattern, methods: MethodSet) -> Self {
        Self { path, methods }
    }

    pub fn parse(path: &str) -> GateResult<Self> {
        Ok(Self::new(PathPattern::parse(path)?, MethodSet::Any))
    }

    pub fn matches(&self, path: &str, method: &Method) -> bool {
        self.methods.contains(method) && self.path.matches(path)
    }
}

/// Ordered sequence of matchers; the pattern matches when any matcher does
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    matchers: Vec<RouteMatcher>,
}

impl RoutePattern {
    pub fn new(matchers: Vec<RouteMatcher>) -> Self {
        Self { matchers }
    }

    pub fn single(path: &str) -> GateResult<Self> {
        Ok(Self::new(vec![RouteMatcher::parse(path)?]))
    }

    pub fn any() -> Self {
        Self::new(vec![RouteMatcher::new(PathPattern::any(), MethodSet::Any)])
    }

    pub fn matchers(&self) -> &[RouteMatcher] {
        &self.matchers
    }

    pub fn matches(&self, path: &str, method: &Method) -> bool {
        self.matchers.iter().any(|m| m.matches(path, method))
    }

    /// Match on path alone, ignoring method restrictions
    pub fn matches_path(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.path.matches(path))
    }
}
