//! HTTP server middleware
//!
//! Outermost first: security headers, CORS guard, `tower_http` CORS layer,
//! gate admission.

pub mod cors;
pub mod gate;
pub mod security;

pub use cors::cors_guard;
pub use gate::gate_middleware;
pub use security::security_headers;
