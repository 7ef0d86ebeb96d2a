//! CORS guard in front of the `tower_http` CORS layer
//!
//! The layer answers every preflight with `200` and leaves the verdict to
//! the browser. The guard turns preflights from disallowed origins or for
//! disallowed methods into `403`, and strips the layer's unconditional
//! headers from responses that were not granted an origin.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::gate::Gate;
use crate::policy::PreflightCheck;

pub async fn cors_guard(State(gate): State<Arc<Gate>>, request: Request, next: Next) -> Response {
    let Some(cors) = gate.cors() else {
        return next.run(request).await;
    };

    let check = cors.check_preflight(request.method(), request.uri().path(), request.headers());
    if check == PreflightCheck::Rejected {
        debug!(path = request.uri().path(), "cors preflight rejected");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "CORS_REJECTED",
                "message": "Invalid CORS request"
            })),
        )
            .into_response();
    }

    let mut response = next.run(request).await;
    if !response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    {
        strip_cors_headers(response.headers_mut());
    }
    response
}

fn strip_cors_headers(headers: &mut HeaderMap) {
    let stray: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with("access-control-"))
        .cloned()
        .collect();
    for name in stray {
        headers.remove(name);
    }
}
