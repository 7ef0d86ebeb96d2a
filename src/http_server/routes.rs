use crate::auth::Identity;
use crate::gate::{Admission, Gate};
use crate::utils::errors::{GateError, GateResult};
use axum::{
    extract::{Extension, Json, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json as AxumJson, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Health check endpoint
pub async fn health() -> AxumJson<serde_json::Value> {
    AxumJson(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Username/password login; sets the session cookie in bounded mode
pub async fn login(
    State(gate): State<Arc<Gate>>,
    Json(request): Json<LoginRequest>,
) -> GateResult<Response> {
    let login = gate.login(&request.username, &request.password).await?;

    let body = AxumJson(json!({
        "subject": login.identity.subject,
        "authorities": login.identity.authorities,
        "session": login.session.as_ref().map(|s| &s.token),
    }));
    let mut response = body.into_response();

    if let (Some(ticket), Some(cookie)) = (&login.session, gate.session_cookie()) {
        let value = HeaderValue::from_str(&format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            cookie, ticket.token
        ))
        .map_err(|e| GateError::InternalError(format!("invalid session cookie: {}", e)))?;
        response.headers_mut().insert(header::SET_COOKIE, value);
    }

    Ok(response)
}

/// Invalidate the session the request was admitted with
pub async fn logout(
    State(gate): State<Arc<Gate>>,
    Extension(admission): Extension<Admission>,
) -> GateResult<Response> {
    let token = admission
        .session
        .ok_or_else(|| GateError::InvalidRequest("No session to log out of".to_string()))?;
    gate.logout(&token);

    let mut response = StatusCode::NO_CONTENT.into_response();
    if let Some(cookie) = gate.session_cookie() {
        let value = HeaderValue::from_str(&format!("{}=; Path=/; Max-Age=0", cookie))
            .map_err(|e| GateError::InternalError(format!("invalid session cookie: {}", e)))?;
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    Ok(response)
}

/// The identity the gate attached, if any
pub async fn me(identity: Option<Extension<Identity>>) -> AxumJson<serde_json::Value> {
    match identity {
        Some(Extension(identity)) => AxumJson(json!({
            "authenticated": true,
            "subject": identity.subject,
            "authorities": identity.authorities,
        })),
        None => AxumJson(json!({ "authenticated": false })),
    }
}

/// Reached only when the gate admitted a path nothing serves
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        AxumJson(json!({
            "error": "NOT_FOUND",
            "message": "No such route"
        })),
    )
        .into_response()
}
