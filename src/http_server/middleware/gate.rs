//! Gate admission middleware
//!
//! Rejections are turned into responses here; headers are added by the
//! outer layers so they reach rejections too.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::gate::{Gate, RequestDescriptor};

pub async fn gate_middleware(
    State(gate): State<Arc<Gate>>,
    request: Request,
    next: Next,
) -> Response {
    // Only `Parts` is borrowed across the await; the body is not `Sync`.
    let (mut parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let descriptor = RequestDescriptor::new(&path, &parts.method, &parts.headers);

    match gate.admit(&descriptor).await {
        Ok(admission) => {
            if let Some(identity) = &admission.identity {
                parts.extensions.insert(identity.clone());
            }
            parts.extensions.insert(admission);
            next.run(Request::from_parts(parts, body)).await
        }
        Err(e) => {
            debug!(path, error = %e, "request rejected by gate");
            e.into_response()
        }
    }
}
