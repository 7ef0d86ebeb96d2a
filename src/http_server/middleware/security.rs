//! Security headers middleware
//!
//! Writes the header policy for the request path onto every response,
//! including preflight answers and rejections.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::gate::Gate;

pub async fn security_headers(
    State(gate): State<Arc<Gate>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;
    gate.apply_headers(&path, response.headers_mut());
    response
}
