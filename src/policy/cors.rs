//! Cross-origin policy
//!
//! One registration pattern plus an immutable rule table, turned into a
//! `tower_http` [`CorsLayer`]. Origin checks go through predicates so that
//! credentials are only granted to listed origins on registered paths.
//! Wildcard methods and headers are mirrored from the preflight request,
//! since a literal `*` is not honoured by browsers when credentials are
//! allowed.

use axum::http::{header, request, HeaderMap, HeaderName, HeaderValue, Method};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{
    AllowCredentials, AllowHeaders, AllowMethods, AllowOrigin, CorsLayer, ExposeHeaders,
};

use crate::config::CorsConfig;
use crate::policy::pattern::{MethodSet, PathPattern};
use crate::utils::errors::{GateError, GateResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Origins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AllowedHeaders {
    Any,
    List(Vec<HeaderName>),
}

/// Verdict on a request before it reaches the CORS layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightCheck {
    /// Not a preflight, or a preflight for a path outside the registration
    NotPreflight,
    Allowed,
    /// Preflight from a disallowed origin or for a disallowed method
    Rejected,
}

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    path: PathPattern,
    origins: Origins,
    methods: MethodSet,
    headers: AllowedHeaders,
    exposed_headers: Vec<HeaderName>,
    allow_credentials: bool,
    max_age: Option<Duration>,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> GateResult<Self> {
        let origins = if config.allowed_origins.iter().any(|o| o == "*") {
            Origins::Any
        } else {
            Origins::List(
                config
                    .allowed_origins
                    .iter()
                    .map(|o| o.trim_end_matches('/').to_string())
                    .collect(),
            )
        };

        let headers = if config.allowed_headers.iter().any(|h| h == "*") {
            AllowedHeaders::Any
        } else {
            AllowedHeaders::List(parse_header_names(&config.allowed_headers)?)
        };

        Ok(Self {
            path: PathPattern::parse(&config.path)?,
            origins,
            methods: MethodSet::parse(&config.allowed_methods)?,
            headers,
            exposed_headers: parse_header_names(&config.exposed_headers)?,
            allow_credentials: config.allow_credentials,
            max_age: config.max_age_secs.map(Duration::from_secs),
        })
    }

    /// True when `origin` may read responses for `path`
    pub fn allows(&self, origin: &HeaderValue, path: &str) -> bool {
        if !self.path.matches(path) {
            return false;
        }
        let Ok(origin) = origin.to_str() else {
            return false;
        };
        match &self.origins {
            Origins::Any => true,
            Origins::List(list) => list.iter().any(|o| o.eq_ignore_ascii_case(origin)),
        }
    }

    pub fn check_preflight(&self, method: &Method, path: &str, headers: &HeaderMap) -> PreflightCheck {
        let (Some(origin), Some(requested)) = (
            headers.get(header::ORIGIN),
            headers.get(header::ACCESS_CONTROL_REQUEST_METHOD),
        ) else {
            return PreflightCheck::NotPreflight;
        };
        if *method != Method::OPTIONS || !self.path.matches(path) {
            return PreflightCheck::NotPreflight;
        }

        let method_allowed = Method::from_bytes(requested.as_bytes())
            .map(|m| self.methods.contains(&m))
            .unwrap_or(false);
        if method_allowed && self.allows(origin, path) {
            PreflightCheck::Allowed
        } else {
            PreflightCheck::Rejected
        }
    }

    pub fn layer(&self) -> CorsLayer {
        let policy = Arc::new(self.clone());

        let origin_policy = policy.clone();
        let mut layer = CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(
                move |origin: &HeaderValue, parts: &request::Parts| {
                    origin_policy.allows(origin, parts.uri.path())
                },
            ))
            .allow_methods(match &self.methods {
                MethodSet::Any => AllowMethods::mirror_request(),
                MethodSet::Only(methods) => AllowMethods::list(methods.clone()),
            })
            .allow_headers(match &self.headers {
                AllowedHeaders::Any => AllowHeaders::mirror_request(),
                AllowedHeaders::List(names) => AllowHeaders::list(names.clone()),
            });

        if self.allow_credentials {
            let credentials_policy = policy;
            layer = layer.allow_credentials(AllowCredentials::predicate(
                move |origin: &HeaderValue, parts: &request::Parts| {
                    credentials_policy.allows(origin, parts.uri.path())
                },
            ));
        }
        if !self.exposed_headers.is_empty() {
            layer = layer.expose_headers(ExposeHeaders::list(self.exposed_headers.clone()));
        }
        if let Some(max_age) = self.max_age {
            layer = layer.max_age(max_age);
        }
        layer
    }
}

fn parse_header_names(names: &[String]) -> GateResult<Vec<HeaderName>> {
    names
        .iter()
        .map(|n| {
            HeaderName::from_bytes(n.as_bytes())
                .map_err(|_| GateError::ConfigError(format!("invalid header name: {}", n)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, Response};
    use std::convert::Infallible;
    use tower::{service_fn, Layer, ServiceExt};

    fn policy() -> CorsPolicy {
        CorsPolicy::from_config(&CorsConfig::default()).unwrap()
    }

    fn request_headers(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_str(origin).unwrap());
        headers
    }

    async fn through_layer(cors: &CorsPolicy, request: Request<Body>) -> Response<Body> {
        let service = cors.layer().layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(Response::new(Body::empty()))
        }));
        service.oneshot(request).await.unwrap()
    }

    #[test]
    fn test_origin_list_and_registration_path() {
        let config = CorsConfig {
            path: "/api/**".to_string(),
            ..Default::default()
        };
        let cors = CorsPolicy::from_config(&config).unwrap();
        let local = HeaderValue::from_static("http://localhost:3300");

        assert!(cors.allows(&local, "/api/x"));
        assert!(!cors.allows(&local, "/login"));
        assert!(!cors.allows(&HeaderValue::from_static("http://evil.example"), "/api/x"));
    }

    #[test]
    fn test_preflight_checks() {
        let config = CorsConfig {
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            ..Default::default()
        };
        let cors = CorsPolicy::from_config(&config).unwrap();

        let mut headers = request_headers("http://localhost:3300");
        assert_eq!(
            cors.check_preflight(&Method::OPTIONS, "/x", &headers),
            PreflightCheck::NotPreflight
        );

        headers.insert(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("DELETE"),
        );
        assert_eq!(
            cors.check_preflight(&Method::OPTIONS, "/x", &headers),
            PreflightCheck::Rejected
        );

        headers.insert(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("POST"),
        );
        assert_eq!(
            cors.check_preflight(&Method::OPTIONS, "/x", &headers),
            PreflightCheck::Allowed
        );

        let mut evil = request_headers("http://evil.example");
        evil.insert(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("GET"),
        );
        assert_eq!(
            cors.check_preflight(&Method::OPTIONS, "/x", &evil),
            PreflightCheck::Rejected
        );
    }

    #[tokio::test]
    async fn test_layer_echoes_allowed_origin_with_credentials() {
        let request = Request::builder()
            .uri("/api/items")
            .header(header::ORIGIN, "http://localhost:3300")
            .body(Body::empty())
            .unwrap();
        let response = through_layer(&policy(), request).await;

        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3300"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_EXPOSE_HEADERS).unwrap(),
            "authorization"
        );
    }

    #[tokio::test]
    async fn test_layer_withholds_credentials_from_other_origins() {
        let request = Request::builder()
            .uri("/api/items")
            .header(header::ORIGIN, "http://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = through_layer(&policy(), request).await;

        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .is_none());
    }

    #[tokio::test]
    async fn test_layer_preflight_mirrors_wildcards() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/items")
            .header(header::ORIGIN, "http://localhost:3300")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
            .body(Body::empty())
            .unwrap();
        let response = through_layer(&policy(), request).await;

        let headers = response.headers();
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(), "PATCH");
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            "authorization,content-type"
        );
        assert_eq!(headers.get(header::ACCESS_CONTROL_MAX_AGE).unwrap(), "3600");
    }

    #[tokio::test]
    async fn test_layer_lists_configured_methods() {
        let config = CorsConfig {
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            ..Default::default()
        };
        let cors = CorsPolicy::from_config(&config).unwrap();
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/x")
            .header(header::ORIGIN, "http://localhost:3300")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = through_layer(&cors, request).await;

        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            "GET,POST"
        );
    }
}
