//! Gate admission tests: ordering, fail-closed verification and session limits

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use gatekeep::auth::{Identity, IdentityVerifier, InMemoryUserStore, NoOpHasher, UserRecord};
use gatekeep::config::{AuthorizationRuleConfig, BoundedSessionConfig, Decision, SessionConfig};
use gatekeep::policy::{AuthorizationPolicy, HeaderPolicy, SessionPolicy};
use gatekeep::utils::{GateError, GateResult};
use gatekeep::{Gate, RequestDescriptor};
use std::sync::Arc;
use std::time::Duration;

fn table(rules: &[(&str, Decision)]) -> AuthorizationPolicy {
    let rules: Vec<_> = rules
        .iter()
        .map(|(path, decision)| AuthorizationRuleConfig::new(path, *decision))
        .collect();
    AuthorizationPolicy::from_config(&rules).unwrap()
}

/// Verifier whose backend is down
struct BrokenVerifier;

#[async_trait]
impl IdentityVerifier for BrokenVerifier {
    async fn verify(&self, _credential: &str) -> GateResult<Identity> {
        Err(GateError::VerifierUnavailable("backend down".to_string()))
    }

    fn name(&self) -> &'static str {
        "broken"
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Verifier that never answers in time
struct HangingVerifier;

#[async_trait]
impl IdentityVerifier for HangingVerifier {
    async fn verify(&self, _credential: &str) -> GateResult<Identity> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Identity::new("never", vec!["*".to_string()]))
    }

    fn name(&self) -> &'static str {
        "hanging"
    }

    fn is_configured(&self) -> bool {
        true
    }
}

fn with_bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

#[tokio::test]
async fn test_earlier_permit_wins_over_later_deny() {
    let gate = Gate::new(
        table(&[("/**", Decision::Permit), ("/admin/**", Decision::Deny)]),
        HeaderPolicy::default(),
    );
    let headers = HeaderMap::new();
    let admission = gate
        .admit(&RequestDescriptor::new("/admin/x", &Method::GET, &headers))
        .await
        .unwrap();
    assert_eq!(admission.decision, Decision::Permit);
}

#[tokio::test]
async fn test_single_char_wildcard_deny_blocks_intended_path() {
    let gate = Gate::new(
        table(&[("/adm?n/**", Decision::Deny), ("/**", Decision::Permit)]),
        HeaderPolicy::default(),
    );
    assert_eq!(
        gate.authorization().decide("/admin/x", &Method::GET),
        Decision::Deny
    );
    assert_eq!(gate.authorization().decide("/adm/x", &Method::GET), Decision::Permit);

    let headers = HeaderMap::new();
    let err = gate
        .admit(&RequestDescriptor::new("/admin/x", &Method::GET, &headers))
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::Unauthorized(_)));
}

#[tokio::test]
async fn test_unavailable_verifier_never_permits() {
    for decision in [Decision::Permit, Decision::RequireAuth, Decision::Deny] {
        let gate = Gate::new(table(&[("/**", decision)]), HeaderPolicy::default())
            .with_verifier(Arc::new(BrokenVerifier));
        let headers = with_bearer("token");
        let result = gate
            .admit(&RequestDescriptor::new("/data", &Method::GET, &headers))
            .await;
        assert!(
            matches!(result, Err(GateError::VerifierUnavailable(_))),
            "admitted with {:?}",
            decision
        );
    }
}

#[tokio::test]
async fn test_hanging_verifier_times_out_closed() {
    let gate = Gate::new(table(&[("/**", Decision::Permit)]), HeaderPolicy::default())
        .with_verifier(Arc::new(HangingVerifier))
        .with_verifier_timeout(Duration::from_millis(20));
    let headers = with_bearer("token");

    let started = std::time::Instant::now();
    let err = gate
        .admit(&RequestDescriptor::new("/data", &Method::GET, &headers))
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::VerifierUnavailable(_)));
    assert!(err.is_denial());
    assert!(started.elapsed() < Duration::from_secs(5));
}

fn session_gate(prevent_new_login_when_full: bool) -> Arc<Gate> {
    let users = InMemoryUserStore::new();
    users.insert(UserRecord {
        username: "u".to_string(),
        password_digest: "pw".to_string(),
        authorities: vec!["ROLE_USER".to_string()],
        enabled: true,
    });
    let gate = Gate::new(table(&[("/**", Decision::RequireAuth)]), HeaderPolicy::default())
        .with_session(SessionPolicy::from_config(&SessionConfig::Bounded(
            BoundedSessionConfig {
                max_sessions: 1,
                prevent_new_login_when_full,
                ..Default::default()
            },
        )))
        .with_hasher(Arc::new(NoOpHasher::new_insecure()))
        .with_users(Arc::new(users));
    Arc::new(gate)
}

fn session_cookie(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("SESSION={}", token)).unwrap(),
    );
    headers
}

#[tokio::test]
async fn test_concurrent_logins_admit_exactly_one() {
    let gate = session_gate(true);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let gate = gate.clone();
        handles.push(tokio::spawn(async move { gate.login("u", "pw").await }));
    }

    let mut admitted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(GateError::TooManySessions { redirect, .. }) => {
                assert_eq!(redirect, "/login/expired");
                rejected += 1;
            }
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(rejected, 7);
}

#[tokio::test]
async fn test_evict_oldest_replaces_first_session() {
    let gate = session_gate(false);

    let first = gate.login("u", "pw").await.unwrap().session.unwrap();
    let second = gate.login("u", "pw").await.unwrap().session.unwrap();

    let headers = session_cookie(&second.token);
    let admission = gate
        .admit(&RequestDescriptor::new("/data", &Method::GET, &headers))
        .await
        .unwrap();
    assert_eq!(admission.identity.unwrap().subject, "u");

    let headers = session_cookie(&first.token);
    let err = gate
        .admit(&RequestDescriptor::new("/data", &Method::GET, &headers))
        .await
        .unwrap_err();
    assert_eq!(err.redirect(), Some("/login/expired"));

    // The tombstone is consumed by the first lookup
    let err = gate
        .admit(&RequestDescriptor::new("/data", &Method::GET, &headers))
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::Unauthorized(_)));
}

#[tokio::test]
async fn test_logout_frees_the_slot() {
    let gate = session_gate(true);

    let ticket = gate.login("u", "pw").await.unwrap().session.unwrap();
    assert!(gate.login("u", "pw").await.is_err());

    assert!(gate.logout(&ticket.token));
    assert!(gate.login("u", "pw").await.is_ok());
}

#[tokio::test]
async fn test_stateless_mode_ignores_session_cookies() {
    let gate = Gate::new(table(&[("/**", Decision::RequireAuth)]), HeaderPolicy::default());
    let headers = session_cookie("made-up");
    let err = gate
        .admit(&RequestDescriptor::new("/data", &Method::GET, &headers))
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::Unauthorized(_)));
}
